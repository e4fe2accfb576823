//! Investor allocation lists and their conversion into batched `addInvestors` calls.

use alloy::primitives::{address, utils::parse_ether, Address, U256};
use itertools::multiunzip;
use miette::Diagnostic;
use serde::{de, Deserialize, Deserializer};
use thiserror::Error;

use crate::{config::NetworkProfile, utils::wei};

pub const SEED_POOL: u8 = 1;
pub const PRESALE_POOL: u8 = 2;
pub const TEAM_POOL: u8 = 4;

#[derive(Debug, Error, Diagnostic)]
pub enum AllocationError {
    #[error("{list} entry #{index} for {address} has no pool")]
    #[diagnostic(help("every seed, presale and team entry needs a `pool` id"))]
    MissingPool { list: &'static str, index: usize, address: Address },

    #[error("the ephemeral allocation set needs at least {needed} local accounts, found {found}")]
    NotEnoughAccounts { needed: usize, found: usize },
}

/// A configured amount: whole tokens, or a decimal string such as `"1.5"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum TokenAmount {
    Whole(u64),
    Decimal(String),
}

fn deserialize_tokens<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    match TokenAmount::deserialize(deserializer)? {
        TokenAmount::Whole(tokens) => Ok(wei(tokens)),
        TokenAmount::Decimal(tokens) => parse_ether(tokens.trim())
            .map_err(|err| de::Error::custom(format!("invalid token amount '{tokens}': {err}"))),
    }
}

/// A single allocation. Amounts are read from configuration in tokens (up to 18 decimals) and
/// kept in base units.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AllocationEntry {
    pub address: Address,
    #[serde(deserialize_with = "deserialize_tokens")]
    pub amount: U256,
    #[serde(default)]
    pub pool: Option<u8>,
}

impl AllocationEntry {
    pub fn new(address: Address, amount: U256, pool: Option<u8>) -> Self {
        Self { address, amount, pool }
    }

    fn pooled(address: Address, tokens: u64, pool: u8) -> Self {
        Self::new(address, wei(tokens), Some(pool))
    }

    fn direct(address: Address, tokens: u64) -> Self {
        Self::new(address, wei(tokens), None)
    }
}

/// The four allocation lists of one distribution run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AllocationBook {
    pub seed: Vec<AllocationEntry>,
    pub presale: Vec<AllocationEntry>,
    pub presale2: Vec<AllocationEntry>,
    pub team: Vec<AllocationEntry>,
}

impl AllocationBook {
    /// Built-in lists for a network profile.
    ///
    /// Ephemeral networks have no literal set; the lists are built from the node's accounts
    /// instead, so `accounts` must hold at least six entries there.
    pub fn for_profile(
        profile: NetworkProfile,
        accounts: &[Address],
    ) -> Result<Self, AllocationError> {
        match profile {
            NetworkProfile::Testnet => Ok(Self::testnet()),
            NetworkProfile::Mainnet => Ok(Self::default()),
            NetworkProfile::Ephemeral => Self::ephemeral(accounts),
        }
    }

    fn testnet() -> Self {
        Self {
            seed: vec![
                AllocationEntry::pooled(
                    address!("0xd9D36eC778455f3bCC7D4D74761304b3b55e540e"),
                    400_000_000,
                    SEED_POOL,
                ),
                AllocationEntry::pooled(
                    address!("0x51182d69af4e3e42147829895dE483857D34cDcF"),
                    100_000_000,
                    SEED_POOL,
                ),
                AllocationEntry::pooled(
                    address!("0xCCFb2ebbDBfa8f476402681d7E809D852398C8B6"),
                    100_000_000,
                    SEED_POOL,
                ),
                AllocationEntry::pooled(
                    address!("0xa02f8b6dA0bf4FAA3Ae0498043F3C2A77199Ee10"),
                    100_000_000,
                    SEED_POOL,
                ),
                AllocationEntry::pooled(
                    address!("0x0ee7B32D94552a2c2865fbdD50a25Fc478ED3332"),
                    100_000_000,
                    SEED_POOL,
                ),
                AllocationEntry::pooled(
                    address!("0x2236E49a5432a82501b786B9C12c84056Fc788F2"),
                    100_000_000,
                    SEED_POOL,
                ),
                AllocationEntry::pooled(
                    address!("0x3839D380f3726E255dF14bC3Ec222965B19685D9"),
                    100_000_000,
                    SEED_POOL,
                ),
            ],
            presale: vec![
                AllocationEntry::pooled(
                    address!("0xd9D36eC778455f3bCC7D4D74761304b3b55e540e"),
                    750_000_000,
                    PRESALE_POOL,
                ),
                AllocationEntry::pooled(
                    address!("0x1eD6cF7911AF6ac584bcb4B919CA341CE21D2272"),
                    750_000_000,
                    PRESALE_POOL,
                ),
                AllocationEntry::pooled(
                    address!("0xB8FB0807aA0BED4aeD8B578D1772717eAb0f4273"),
                    500_000_000,
                    PRESALE_POOL,
                ),
            ],
            presale2: vec![
                AllocationEntry::direct(
                    address!("0x04dcBc1B489b8D476e3f00a54866316fa107580b"),
                    750_000_000,
                ),
                AllocationEntry::direct(
                    address!("0x11765155d2c9000b9436701B898f4b366d8cc5Cf"),
                    750_000_000,
                ),
            ],
            team: vec![
                AllocationEntry::pooled(
                    address!("0x3CB5723f44308B978fEeA8dF8f4BEA3fB856E70B"),
                    1_000_000_000,
                    TEAM_POOL,
                ),
                AllocationEntry::pooled(
                    address!("0x0203889F3D71EDcf03eD023f90329614FB3f7c92"),
                    1_000_000_000,
                    TEAM_POOL,
                ),
            ],
        }
    }

    fn ephemeral(accounts: &[Address]) -> Result<Self, AllocationError> {
        let needed = 6;
        if accounts.len() < needed {
            return Err(AllocationError::NotEnoughAccounts { needed, found: accounts.len() });
        }

        Ok(Self {
            seed: vec![AllocationEntry::pooled(accounts[2], 1_000_000_000, SEED_POOL)],
            presale: vec![AllocationEntry::pooled(accounts[3], 2_000_000_000, PRESALE_POOL)],
            presale2: vec![AllocationEntry::direct(accounts[4], 1_500_000_000)],
            team: vec![AllocationEntry::pooled(accounts[5], 2_000_000_000, TEAM_POOL)],
        })
    }
}

/// Parallel sequences passed to a single `addInvestors` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvestorBatch {
    pub addresses: Vec<Address>,
    pub amounts: Vec<U256>,
    pub pools: Vec<u8>,
}

impl InvestorBatch {
    /// Splits a list into its three columns, keeping the original order. Duplicate addresses
    /// are kept as separate entries.
    pub fn from_entries(
        list: &'static str,
        entries: &[AllocationEntry],
    ) -> Result<Self, AllocationError> {
        let rows = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| match entry.pool {
                Some(pool) => Ok((entry.address, entry.amount, pool)),
                None => Err(AllocationError::MissingPool { list, index, address: entry.address }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (addresses, amounts, pools) = multiunzip(rows);
        Ok(Self { addresses, amounts, pools })
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}
