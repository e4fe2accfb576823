//! Record of addresses produced by earlier runs.
//!
//! The ledger is a small JSON document keyed by chain id and deployment target. Every fresh
//! deployment is written back as soon as it is complete, so that a run interrupted halfway binds
//! the contracts it already finished the next time it is started. A recorded address that holds
//! no code, as after a local node restart, is ignored.

use std::{collections::BTreeMap, path::PathBuf};

use alloy::primitives::Address;
use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    chain::{ChainClient, ChainError, ContractKind, DeploymentTarget},
    config::AddressBook,
};

type Chains = BTreeMap<u64, BTreeMap<DeploymentTarget, Address>>;

#[derive(Debug, Error, Diagnostic)]
pub enum LedgerError {
    #[error("failed to access deployment ledger {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("deployment ledger {} is malformed", path.display())]
    #[diagnostic(help("fix or remove the file; it only caches addresses of earlier runs"))]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The default ledger lives in memory only and is never persisted.
#[derive(Debug, Clone, Default)]
pub struct DeploymentLedger {
    path: Option<PathBuf>,
    chains: Chains,
}

impl DeploymentLedger {
    /// Opens the ledger at `path`. A missing file is an empty ledger.
    pub fn open(path: PathBuf) -> Result<Self, LedgerError> {
        let chains = match std::fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json)
                .map_err(|source| LedgerError::Format { path: path.clone(), source })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Chains::new(),
            Err(source) => return Err(LedgerError::Io { path, source }),
        };
        Ok(Self { path: Some(path), chains })
    }

    pub fn get(&self, chain_id: u64, target: DeploymentTarget) -> Option<Address> {
        self.chains
            .get(&chain_id)
            .and_then(|targets| targets.get(&target))
            .copied()
    }

    /// Stores an address and flushes the ledger to disk when it is file backed.
    pub fn record(
        &mut self,
        chain_id: u64,
        target: DeploymentTarget,
        address: Address,
    ) -> Result<(), LedgerError> {
        self.chains
            .entry(chain_id)
            .or_default()
            .insert(target, address);
        self.flush()
    }

    fn flush(&self) -> Result<(), LedgerError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.chains)
            .map_err(|source| LedgerError::Format { path: path.clone(), source })?;
        std::fs::write(path, json)
            .map_err(|source| LedgerError::Io { path: path.clone(), source })?;
        debug!("Deployment ledger written to {}", path.display());
        Ok(())
    }

    /// Fills the contract addresses missing from `book` with the ones recorded for `chain_id`
    /// that still hold code on the connected chain.
    pub async fn complete<C: ChainClient>(
        &self,
        client: &C,
        chain_id: u64,
        book: AddressBook,
    ) -> Result<AddressBook, ChainError> {
        Ok(AddressBook {
            stable_coin: self
                .fill(client, chain_id, ContractKind::StableCoin, book.stable_coin)
                .await?,
            allocation_token: self
                .fill(client, chain_id, ContractKind::AllocationToken, book.allocation_token)
                .await?,
            primary_token: self
                .fill(client, chain_id, ContractKind::PrimaryToken, book.primary_token)
                .await?,
            ..book
        })
    }

    async fn fill<C: ChainClient>(
        &self,
        client: &C,
        chain_id: u64,
        kind: ContractKind,
        known: Option<Address>,
    ) -> Result<Option<Address>, ChainError> {
        if known.is_some() {
            return Ok(known);
        }
        let Some(address) = self.get(chain_id, DeploymentTarget::from(kind)) else {
            return Ok(None);
        };
        if !client.has_code(address).await? {
            warn!("Recorded {kind} at {address} has no code on chain {chain_id}, ignoring it");
            return Ok(None);
        }
        debug!("Found recorded {kind} at {address}");
        Ok(Some(address))
    }
}
