//! Distribution pipeline.
//!
//! Transfers the allocation token to every presale2 recipient, then registers the seed, presale
//! and team lists as investors on the primary token with one batched call per list.

use alloy::primitives::TxHash;
use miette::WrapErr;
use tracing::{debug, info, warn};

use crate::{
    allocations::{AllocationBook, InvestorBatch},
    chain::{ChainClient, ContractCall},
    config::{AddressBook, DeployConfig, NetworkProfile},
    ledger::DeploymentLedger,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionReport {
    pub transfers: Vec<TxHash>,
    /// `(list name, transaction)` per batched call, in issue order.
    pub investor_batches: Vec<(&'static str, TxHash)>,
}

/// Built-in lists for the profile unless the configuration provides its own.
pub async fn load_allocations<C: ChainClient>(
    client: &C,
    config: &DeployConfig,
) -> miette::Result<AllocationBook> {
    if let Some(book) = &config.allocations {
        info!("Using allocation lists from configuration");
        return Ok(book.clone());
    }

    let accounts = match config.network {
        NetworkProfile::Ephemeral => client
            .accounts()
            .await
            .wrap_err("Failed to list local accounts")?,
        NetworkProfile::Testnet | NetworkProfile::Mainnet => Vec::new(),
    };
    let book = AllocationBook::for_profile(config.network, &accounts)?;
    Ok(book)
}

pub async fn run_distribution<C: ChainClient>(
    client: &C,
    config: &DeployConfig,
    ledger: &DeploymentLedger,
) -> miette::Result<DistributionReport> {
    info!("Distributing allocations on {}", config.network);

    let book = load_allocations(client, config).await?;
    let chain_id = client
        .chain_id()
        .await
        .wrap_err("Failed to read the chain id")?;
    let addresses = ledger
        .complete(client, chain_id, config.address_book())
        .await
        .wrap_err("Failed to check recorded deployments")?;
    distribute(client, &book, &addresses).await
}

pub async fn distribute<C: ChainClient>(
    client: &C,
    book: &AllocationBook,
    addresses: &AddressBook,
) -> miette::Result<DistributionReport> {
    // All lists are validated before anything is sent.
    let batches = [
        ("seed", InvestorBatch::from_entries("seed", &book.seed)?),
        ("presale", InvestorBatch::from_entries("presale", &book.presale)?),
        ("team", InvestorBatch::from_entries("team", &book.team)?),
    ];

    let mut report = DistributionReport::default();

    if !book.presale2.is_empty() {
        let token = addresses
            .allocation_token
            .ok_or_else(|| {
                miette::miette!(
                    help = "deploy it with `bootstrap` or set `addresses.allocation_token`",
                    "Allocation token address is unknown, cannot transfer to presale2 recipients"
                )
            })?;

        info!("Transferring allocation tokens to {} presale2 recipients", book.presale2.len());
        for entry in &book.presale2 {
            let call =
                ContractCall::Transfer { token, recipient: entry.address, amount: entry.amount };
            let tx_hash = client
                .send(&call)
                .await
                .wrap_err(format!("Transfer to {} failed", entry.address))?;
            debug!("{call} confirmed in {tx_hash}");
            report.transfers.push(tx_hash);
        }
    }

    let Some(token) = addresses.primary_token else {
        warn!("Primary token address is unknown, skipping investor registration");
        return Ok(report);
    };

    for (name, batch) in batches {
        if batch.is_empty() {
            debug!("The {name} list is empty");
        }
        info!("Adding {} {name} investors", batch.len());
        let call = ContractCall::AddInvestors { token, batch };
        let tx_hash = client
            .send(&call)
            .await
            .wrap_err(format!("Adding {name} investors failed"))?;
        info!("{call} confirmed in {tx_hash}");
        report.investor_batches.push((name, tx_hash));
    }

    Ok(report)
}
