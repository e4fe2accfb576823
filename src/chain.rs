//! Capability interface between the pipelines and the network.
//!
//! The pipelines only ever deploy a contract, send a transaction, list the accounts they can
//! sign for and read a pair address back from the DEX factory. Everything they need is described
//! by the plain data types in this module so that a live RPC client and the in-memory fake used
//! in tests can be swapped freely.

use std::fmt;

use alloy::primitives::{Address, TxHash, U256};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{allocations::InvestorBatch, artifacts::ArtifactError};

/// Contracts the bootstrap pipeline may deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    StableCoin,
    AllocationToken,
    PrimaryToken,
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractKind::StableCoin => write!(f, "stable coin"),
            ContractKind::AllocationToken => write!(f, "allocation token"),
            ContractKind::PrimaryToken => write!(f, "primary token"),
        }
    }
}

/// Everything the deployment ledger keeps an address for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentTarget {
    StableCoin,
    AllocationToken,
    PrimaryToken,
    Pair,
}

impl From<ContractKind> for DeploymentTarget {
    fn from(kind: ContractKind) -> Self {
        match kind {
            ContractKind::StableCoin => DeploymentTarget::StableCoin,
            ContractKind::AllocationToken => DeploymentTarget::AllocationToken,
            ContractKind::PrimaryToken => DeploymentTarget::PrimaryToken,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstructorArgs {
    Token { name: String, symbol: String },
    PrimaryToken { factory: Address, stable_coin: Address, allocation_token: Address },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    pub kind: ContractKind,
    pub args: ConstructorArgs,
}

impl DeployRequest {
    pub fn token(kind: ContractKind, name: &str, symbol: &str) -> Self {
        Self {
            kind,
            args: ConstructorArgs::Token { name: name.to_string(), symbol: symbol.to_string() },
        }
    }

    pub fn primary_token(
        factory: Address,
        stable_coin: Address,
        allocation_token: Address,
    ) -> Self {
        Self {
            kind: ContractKind::PrimaryToken,
            args: ConstructorArgs::PrimaryToken { factory, stable_coin, allocation_token },
        }
    }
}

/// Router `addLiquidity` parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityOrder {
    pub router: Address,
    pub token_a: Address,
    pub token_b: Address,
    pub amount_a: U256,
    pub amount_b: U256,
    pub min_a: U256,
    pub min_b: U256,
    pub recipient: Address,
    pub deadline: u64,
}

/// State-changing calls issued by the pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    SetStakingStartDate { token: Address, start: u64 },
    DistributeSale { token: Address, recipient: Address },
    Approve { token: Address, spender: Address, amount: U256 },
    Transfer { token: Address, recipient: Address, amount: U256 },
    AddInvestors { token: Address, batch: InvestorBatch },
    CreatePair { factory: Address, token_a: Address, token_b: Address },
    AddLiquidity(LiquidityOrder),
}

impl ContractCall {
    /// Contract the call is sent to.
    pub fn target(&self) -> Address {
        match self {
            ContractCall::SetStakingStartDate { token, .. }
            | ContractCall::DistributeSale { token, .. }
            | ContractCall::Approve { token, .. }
            | ContractCall::Transfer { token, .. }
            | ContractCall::AddInvestors { token, .. } => *token,
            ContractCall::CreatePair { factory, .. } => *factory,
            ContractCall::AddLiquidity(order) => order.router,
        }
    }
}

impl fmt::Display for ContractCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractCall::SetStakingStartDate { start, .. } => {
                write!(f, "setStakingStartDate({start})")
            }
            ContractCall::DistributeSale { recipient, .. } => {
                write!(f, "distributeSale({recipient})")
            }
            ContractCall::Approve { spender, amount, .. } => {
                write!(f, "approve({spender}, {amount})")
            }
            ContractCall::Transfer { recipient, amount, .. } => {
                write!(f, "transfer({recipient}, {amount})")
            }
            ContractCall::AddInvestors { batch, .. } => {
                write!(f, "addInvestors({} investors)", batch.len())
            }
            ContractCall::CreatePair { token_a, token_b, .. } => {
                write!(f, "createPair({token_a}, {token_b})")
            }
            ContractCall::AddLiquidity(order) => write!(
                f,
                "addLiquidity({}, {}, {}, {}, deadline {})",
                order.token_a, order.token_b, order.amount_a, order.amount_b, order.deadline
            ),
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ChainError {
    #[error("the node did not report any account to send from")]
    #[diagnostic(help("pass --private-key or unlock an account on the node"))]
    NoAccounts,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("RPC transport error")]
    Transport(#[from] alloy::transports::TransportError),

    #[error("failed waiting for transaction receipt")]
    Receipt(#[from] alloy::providers::PendingTransactionError),

    #[error("failed to decode call output")]
    Decode(#[from] alloy::sol_types::Error),

    #[error("{call} reverted in transaction {tx_hash}")]
    Reverted { call: String, tx_hash: TxHash },

    #[error("deployment of the {kind} in transaction {tx_hash} did not create a contract")]
    MissingContractAddress { kind: ContractKind, tx_hash: TxHash },
}

/// Minimal set of network operations the pipelines depend on.
///
/// Every method resolves only once the underlying transaction is mined, so callers can rely on
/// strict ordering between consecutive calls.
#[allow(async_fn_in_trait)]
pub trait ChainClient {
    /// Accounts available for signing. The first one is the deployer.
    async fn accounts(&self) -> Result<Vec<Address>, ChainError>;

    /// Account used as deployer and default recipient.
    async fn deployer(&self) -> Result<Address, ChainError> {
        self.accounts()
            .await?
            .first()
            .copied()
            .ok_or(ChainError::NoAccounts)
    }

    async fn chain_id(&self) -> Result<u64, ChainError>;

    /// Whether `address` holds contract code.
    async fn has_code(&self, address: Address) -> Result<bool, ChainError>;

    async fn deploy(&self, request: &DeployRequest) -> Result<Address, ChainError>;

    async fn send(&self, call: &ContractCall) -> Result<TxHash, ChainError>;

    /// Reads the pair registered on `factory` for the two tokens.
    async fn pair_address(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
    ) -> Result<Address, ChainError>;
}
