use std::{
    fmt,
    path::{Path, PathBuf},
};

use alloy::primitives::{address, Address, U256};
use clap::ValueEnum;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use miette::{IntoDiagnostic, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{allocations::AllocationBook, chain::ContractKind, utils::wei};

/// Environment prefix for configuration overrides, e.g. `XTRA_ADDRESSES__PRIMARY_TOKEN`.
pub const ENV_PREFIX: &str = "XTRA_";

const PANCAKE_TESTNET_ROUTER: Address = address!("0xD99D1c33F9fC3444f8101754aBC46c52416550D1");
const PANCAKE_TESTNET_FACTORY: Address = address!("0x6725F303b657a9451d8BA641348b6761A6CC7a17");
const PANCAKE_MAINNET_ROUTER: Address = address!("0x10ED43C718714eb63d5aA57B78B54704E256024E");
const PANCAKE_MAINNET_FACTORY: Address = address!("0xcA143Ce32Fe78f1f7019d7d551a6402fC5350c73");

/// Selects the built-in address book and allocation lists.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum NetworkProfile {
    Testnet,
    Mainnet,
    /// Throwaway chain with nothing deployed yet.
    #[default]
    #[serde(alias = "local")]
    #[value(alias = "local")]
    Ephemeral,
}

impl fmt::Display for NetworkProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkProfile::Testnet => write!(f, "testnet"),
            NetworkProfile::Mainnet => write!(f, "mainnet"),
            NetworkProfile::Ephemeral => write!(f, "ephemeral"),
        }
    }
}

/// Addresses known before a run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressBook {
    pub stable_coin: Option<Address>,
    pub allocation_token: Option<Address>,
    pub primary_token: Option<Address>,
    pub router: Address,
    pub factory: Address,
}

impl AddressBook {
    pub fn for_profile(profile: NetworkProfile) -> Self {
        match profile {
            NetworkProfile::Testnet => Self {
                stable_coin: Some(address!("0x52f4916da41E1205b7Df478f3E74eEaD42e2725C")),
                allocation_token: None,
                primary_token: Some(address!("0x622A42eeC118304Eeb76Bf1Ac0dc08023BdF61f1")),
                router: PANCAKE_TESTNET_ROUTER,
                factory: PANCAKE_TESTNET_FACTORY,
            },
            NetworkProfile::Mainnet => Self {
                stable_coin: Some(address!("0xe9e7cea3dedca5984780bafc599bd69add087d56")),
                allocation_token: None,
                primary_token: None,
                router: PANCAKE_MAINNET_ROUTER,
                factory: PANCAKE_MAINNET_FACTORY,
            },
            NetworkProfile::Ephemeral => Self {
                stable_coin: None,
                allocation_token: None,
                primary_token: None,
                router: PANCAKE_TESTNET_ROUTER,
                factory: PANCAKE_TESTNET_FACTORY,
            },
        }
    }

    pub fn contract(&self, kind: ContractKind) -> Option<Address> {
        match kind {
            ContractKind::StableCoin => self.stable_coin,
            ContractKind::AllocationToken => self.allocation_token,
            ContractKind::PrimaryToken => self.primary_token,
        }
    }
}

/// Per-field overrides of the built-in address book.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AddressOverrides {
    pub stable_coin: Option<Address>,
    pub allocation_token: Option<Address>,
    pub primary_token: Option<Address>,
    pub router: Option<Address>,
    pub factory: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TokenSettings {
    pub stable_coin: TokenMetadata,
    pub allocation_token: TokenMetadata,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            stable_coin: TokenMetadata {
                name: "BUST Stable Coin".to_string(),
                symbol: "BUSD".to_string(),
            },
            allocation_token: TokenMetadata {
                name: "Allocation Xtra Token".to_string(),
                symbol: "AXTRA".to_string(),
            },
        }
    }
}

/// Artifact names (without extension) inside `artifacts_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ArtifactNames {
    pub stable_coin: String,
    pub allocation_token: String,
    pub primary_token: String,
}

impl Default for ArtifactNames {
    fn default() -> Self {
        Self {
            stable_coin: "ERC20SimpleToken".to_string(),
            allocation_token: "AlloactionXtraToken".to_string(),
            primary_token: "Xtra".to_string(),
        }
    }
}

impl ArtifactNames {
    pub fn for_kind(&self, kind: ContractKind) -> &str {
        match kind {
            ContractKind::StableCoin => &self.stable_coin,
            ContractKind::AllocationToken => &self.allocation_token,
            ContractKind::PrimaryToken => &self.primary_token,
        }
    }
}

/// Initial pair liquidity, in whole tokens.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LiquiditySettings {
    pub primary_tokens: u64,
    pub stable_tokens: u64,
    pub deadline_secs: u64,
}

impl Default for LiquiditySettings {
    fn default() -> Self {
        Self { primary_tokens: 1_500_000_000, stable_tokens: 1_500_000, deadline_secs: 100 }
    }
}

impl LiquiditySettings {
    pub fn primary_amount(&self) -> U256 {
        wei(self.primary_tokens)
    }

    pub fn stable_amount(&self) -> U256 {
        wei(self.stable_tokens)
    }
}

/// Configuration shared by both pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub network: NetworkProfile,
    /// Seeds the DEX pair after a fresh deployment. Defaults to on everywhere but mainnet.
    pub test_mode: Option<bool>,
    pub rpc_url: String,
    pub artifacts_dir: PathBuf,
    pub deployments_file: PathBuf,
    pub addresses: AddressOverrides,
    pub tokens: TokenSettings,
    pub artifacts: ArtifactNames,
    pub liquidity: LiquiditySettings,
    /// Receiver of the initial sale distribution. Defaults to the deployer.
    pub sale_recipient: Option<Address>,
    /// Replaces the built-in allocation lists of the profile.
    pub allocations: Option<AllocationBook>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            network: NetworkProfile::default(),
            test_mode: None,
            rpc_url: "http://localhost:8545".to_string(),
            artifacts_dir: PathBuf::from("build/contracts"),
            deployments_file: PathBuf::from("deployments.json"),
            addresses: AddressOverrides::default(),
            tokens: TokenSettings::default(),
            artifacts: ArtifactNames::default(),
            liquidity: LiquiditySettings::default(),
            sale_recipient: None,
            allocations: None,
        }
    }
}

/// Command line values that take precedence over the file and the environment.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_mode: Option<bool>,
}

impl DeployConfig {
    /// Layers the YAML file, `XTRA_*` environment variables and command line overrides.
    pub fn figment(config_path: &Path, overrides: &CliOverrides) -> Figment {
        Figment::new()
            .merge(Yaml::file(config_path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Serialized::defaults(overrides))
    }

    pub fn load(config_path: &Path, overrides: &CliOverrides) -> miette::Result<Self> {
        info!("Config YAML: {}", config_path.display());
        let config = Self::figment(config_path, overrides)
            .extract::<DeployConfig>()
            .into_diagnostic()
            .wrap_err("Failed to load deployment configuration:")?;
        Ok(config)
    }

    pub fn seeds_liquidity(&self) -> bool {
        self.test_mode
            .unwrap_or(self.network != NetworkProfile::Mainnet)
    }

    /// Built-in address book of the active profile with the configured overrides applied.
    pub fn address_book(&self) -> AddressBook {
        let builtin = AddressBook::for_profile(self.network);
        let overrides = &self.addresses;
        AddressBook {
            stable_coin: overrides.stable_coin.or(builtin.stable_coin),
            allocation_token: overrides
                .allocation_token
                .or(builtin.allocation_token),
            primary_token: overrides
                .primary_token
                .or(builtin.primary_token),
            router: overrides.router.unwrap_or(builtin.router),
            factory: overrides.factory.unwrap_or(builtin.factory),
        }
    }
}
