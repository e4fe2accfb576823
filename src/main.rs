mod allocations;
mod artifacts;
mod bootstrap;
mod chain;
mod config;
mod distribution;
mod ledger;
mod rpc;
#[cfg(test)]
mod testing;
mod utils;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, WrapErr};
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    artifacts::ArtifactStore,
    bootstrap::{Bootstrap, BootstrapReport},
    config::{CliOverrides, DeployConfig, NetworkProfile},
    distribution::{run_distribution, DistributionReport},
    ledger::DeploymentLedger,
    rpc::RpcClient,
    utils::unix_now,
};

#[derive(Parser, Debug)]
#[command(version, about = "Deploy the Xtra token contracts and distribute investor allocations")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path of the YAML configuration file
    #[arg(long, global = true, default_value = "deploy.yaml")]
    config: PathBuf,

    /// Network profile selecting the known addresses and allocation lists
    #[arg(long, global = true, value_enum)]
    network: Option<NetworkProfile>,

    /// JSON-RPC endpoint of the node
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Seed the DEX pair after a fresh deployment
    #[arg(long, global = true)]
    test_mode: Option<bool>,

    /// Key used to sign transactions. Without it the node's first unlocked account is used
    #[arg(long, global = true, env = "DEPLOYER_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Deploy or bind the token contracts and seed the DEX pair
    Bootstrap,
    /// Transfer presale2 allocations and register investors
    Distribute,
    /// Run bootstrap followed by distribute
    Migrate,
}

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = Args::parse();

    let overrides = CliOverrides {
        network: args.network,
        rpc_url: args.rpc_url.clone(),
        test_mode: args.test_mode,
    };
    let config = DeployConfig::load(&args.config, &overrides)?;

    let rt = Runtime::new()
        .into_diagnostic()
        .wrap_err("Failed to start the async runtime")?;
    rt.block_on(run(args.command, &config, args.private_key.as_deref()))
}

async fn run(
    command: Command,
    config: &DeployConfig,
    private_key: Option<&str>,
) -> miette::Result<()> {
    let artifacts = ArtifactStore::new(config.artifacts_dir.clone(), config.artifacts.clone());
    let client = RpcClient::connect(&config.rpc_url, private_key, artifacts).await?;
    let mut ledger = DeploymentLedger::open(config.deployments_file.clone())?;

    if matches!(command, Command::Bootstrap | Command::Migrate) {
        let report = Bootstrap::prepare(&client, config, &mut ledger, unix_now())
            .await?
            .run()
            .await
            .wrap_err("Bootstrap failed")?;
        log_bootstrap(&report);
    }

    if matches!(command, Command::Distribute | Command::Migrate) {
        let report = run_distribution(&client, config, &ledger)
            .await
            .wrap_err("Distribution failed")?;
        log_distribution(&report);
    }

    Ok(())
}

fn log_bootstrap(report: &BootstrapReport) {
    info!("Stable coin: {:?}", report.stable_coin);
    info!("Allocation token: {:?}", report.allocation_token);
    info!("Primary token: {:?}", report.primary_token);
    match &report.liquidity {
        Some(seed) => info!("Liquidity added to pair {} in {}", seed.pair, seed.tx_hash),
        None => info!("No liquidity added"),
    }
}

fn log_distribution(report: &DistributionReport) {
    info!("{} presale2 transfers confirmed", report.transfers.len());
    for (name, tx_hash) in &report.investor_batches {
        info!("{name} investors added in {tx_hash}");
    }
}
