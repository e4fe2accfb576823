//! Bootstrap pipeline.
//!
//! Binds or deploys the stable coin, the allocation token and the primary token, configures a
//! freshly deployed primary token and, in test mode, seeds its DEX pair with liquidity.

use alloy::primitives::{Address, TxHash, U256};
use miette::WrapErr;
use tracing::{debug, info, warn};

use crate::{
    chain::{
        ChainClient, ContractCall, ContractKind, DeployRequest, DeploymentTarget, LiquidityOrder,
    },
    config::{AddressBook, DeployConfig},
    ledger::DeploymentLedger,
    utils::unix_now,
};

/// How a contract was obtained in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Address was known beforehand; nothing was deployed.
    Bound(Address),
    Deployed(Address),
}

impl Resolution {
    pub fn address(&self) -> Address {
        match self {
            Resolution::Bound(address) | Resolution::Deployed(address) => *address,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Resolution::Deployed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquiditySeed {
    pub pair: Address,
    pub tx_hash: TxHash,
}

#[derive(Debug)]
pub struct Bootstrap<'a, C> {
    client: &'a C,
    config: &'a DeployConfig,
    ledger: &'a mut DeploymentLedger,
    started_at: u64,
    chain_id: u64,
    deployer: Address,
    book: AddressBook,
}

impl<'a, C: ChainClient> Bootstrap<'a, C> {
    /// Looks up the deployer and the contracts already known on the connected chain.
    ///
    /// `started_at` is the unix timestamp used as the staking start date.
    pub async fn prepare(
        client: &'a C,
        config: &'a DeployConfig,
        ledger: &'a mut DeploymentLedger,
        started_at: u64,
    ) -> miette::Result<Self> {
        let deployer = client
            .deployer()
            .await
            .wrap_err("Failed to determine the deployer account")?;
        let chain_id = client
            .chain_id()
            .await
            .wrap_err("Failed to read the chain id")?;
        let book = ledger
            .complete(client, chain_id, config.address_book())
            .await
            .wrap_err("Failed to check recorded deployments")?;
        debug!("Deploying from {deployer} on chain {chain_id}");

        Ok(Self { client, config, ledger, started_at, chain_id, deployer, book })
    }

    pub async fn run(mut self) -> miette::Result<BootstrapReport> {
        info!("Bootstrapping contracts on {}", self.config.network);

        let config = self.config;
        let tokens = &config.tokens;
        let stable_coin = self
            .resolve(DeployRequest::token(
                ContractKind::StableCoin,
                &tokens.stable_coin.name,
                &tokens.stable_coin.symbol,
            ))
            .await?;
        let allocation_token = self
            .resolve(DeployRequest::token(
                ContractKind::AllocationToken,
                &tokens.allocation_token.name,
                &tokens.allocation_token.symbol,
            ))
            .await?;
        // Recorded only once it is fully set up, so an interrupted run deploys it again.
        let primary_token = resolve_or_deploy(
            self.client,
            self.book.primary_token,
            DeployRequest::primary_token(
                self.book.factory,
                stable_coin.address(),
                allocation_token.address(),
            ),
        )
        .await?;

        if primary_token.is_fresh() {
            self.configure_primary(primary_token.address())
                .await?;
        } else {
            info!("Primary token was already deployed, skipping staking and sale setup");
        }

        let liquidity = match (config.seeds_liquidity(), primary_token.is_fresh()) {
            (true, true) => Some(
                self.seed_liquidity(primary_token.address(), stable_coin.address())
                    .await?,
            ),
            (true, false) => {
                warn!("Primary token was not deployed in this run, skipping liquidity seeding");
                None
            }
            (false, _) => None,
        };

        if primary_token.is_fresh() {
            self.record(DeploymentTarget::PrimaryToken, primary_token.address())?;
        }

        Ok(BootstrapReport { stable_coin, allocation_token, primary_token, liquidity })
    }

    async fn resolve(&mut self, request: DeployRequest) -> miette::Result<Resolution> {
        let kind = request.kind;
        let resolution = resolve_or_deploy(self.client, self.book.contract(kind), request).await?;

        if resolution.is_fresh() {
            self.record(DeploymentTarget::from(kind), resolution.address())?;
        }
        Ok(resolution)
    }

    fn record(&mut self, target: DeploymentTarget, address: Address) -> miette::Result<()> {
        self.ledger
            .record(self.chain_id, target, address)
            .wrap_err("Failed to record deployment")
    }

    async fn configure_primary(&self, token: Address) -> miette::Result<()> {
        send(self.client, ContractCall::SetStakingStartDate { token, start: self.started_at })
            .await?;

        let recipient = self
            .config
            .sale_recipient
            .unwrap_or(self.deployer);
        send(self.client, ContractCall::DistributeSale { token, recipient }).await?;
        Ok(())
    }

    async fn seed_liquidity(
        &mut self,
        primary_token: Address,
        stable_coin: Address,
    ) -> miette::Result<LiquiditySeed> {
        let AddressBook { router, factory, .. } = self.book;
        let liquidity = &self.config.liquidity;
        let primary_amount = liquidity.primary_amount();
        let stable_amount = liquidity.stable_amount();

        info!("Seeding liquidity for the primary token / stable coin pair");
        send(
            self.client,
            ContractCall::CreatePair { factory, token_a: primary_token, token_b: stable_coin },
        )
        .await?;
        send(
            self.client,
            ContractCall::Approve { token: primary_token, spender: router, amount: primary_amount },
        )
        .await?;
        send(
            self.client,
            ContractCall::Approve { token: stable_coin, spender: router, amount: stable_amount },
        )
        .await?;

        let order = LiquidityOrder {
            router,
            token_a: primary_token,
            token_b: stable_coin,
            amount_a: primary_amount,
            amount_b: stable_amount,
            min_a: U256::ZERO,
            min_b: U256::ZERO,
            recipient: self.deployer,
            deadline: unix_now().saturating_add(liquidity.deadline_secs),
        };
        let tx_hash = send(self.client, ContractCall::AddLiquidity(order)).await?;

        let pair = self
            .client
            .pair_address(factory, primary_token, stable_coin)
            .await
            .wrap_err("Failed to read the pair address from the factory")?;
        info!("Pair created at {pair}");
        self.record(DeploymentTarget::Pair, pair)?;

        Ok(LiquiditySeed { pair, tx_hash })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chain::ConstructorArgs,
        config::{AddressOverrides, NetworkProfile},
        testing::{FakeChain, Recorded},
        utils::wei,
    };

    const STARTED_AT: u64 = 1_700_000_000;

    fn config(network: NetworkProfile, test_mode: bool) -> DeployConfig {
        DeployConfig { network, test_mode: Some(test_mode), ..Default::default() }
    }

    async fn run(chain: &FakeChain, config: &DeployConfig) -> miette::Result<BootstrapReport> {
        let mut ledger = DeploymentLedger::default();
        bootstrap(chain, config, &mut ledger).await
    }

    async fn bootstrap(
        chain: &FakeChain,
        config: &DeployConfig,
        ledger: &mut DeploymentLedger,
    ) -> miette::Result<BootstrapReport> {
        Bootstrap::prepare(chain, config, ledger, STARTED_AT)
            .await?
            .run()
            .await
    }

    #[tokio::test]
    async fn test_resolve_binds_known_address() {
        let chain = FakeChain::new();
        let known = Address::with_last_byte(9);

        let resolution = resolve_or_deploy(
            &chain,
            Some(known),
            DeployRequest::token(ContractKind::StableCoin, "Stable", "STB"),
        )
        .await
        .unwrap();

        assert_eq!(resolution, Resolution::Bound(known));
        assert!(chain.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_fresh_deploy_sequence() {
        let chain = FakeChain::new();
        let config = config(NetworkProfile::Ephemeral, false);

        let report = run(&chain, &config).await.unwrap();

        let stable = FakeChain::deployed_address(0);
        let allocation = FakeChain::deployed_address(1);
        let primary = FakeChain::deployed_address(2);
        let factory = config.address_book().factory;

        assert_eq!(report.stable_coin, Resolution::Deployed(stable));
        assert_eq!(report.allocation_token, Resolution::Deployed(allocation));
        assert_eq!(report.primary_token, Resolution::Deployed(primary));
        assert_eq!(report.liquidity, None);

        assert_eq!(
            chain.recorded(),
            vec![
                Recorded::Deploy(DeployRequest::token(
                    ContractKind::StableCoin,
                    "BUST Stable Coin",
                    "BUSD"
                )),
                Recorded::Deploy(DeployRequest::token(
                    ContractKind::AllocationToken,
                    "Allocation Xtra Token",
                    "AXTRA"
                )),
                Recorded::Deploy(DeployRequest {
                    kind: ContractKind::PrimaryToken,
                    args: ConstructorArgs::PrimaryToken {
                        factory,
                        stable_coin: stable,
                        allocation_token: allocation,
                    },
                }),
                Recorded::Send(ContractCall::SetStakingStartDate {
                    token: primary,
                    start: STARTED_AT
                }),
                Recorded::Send(ContractCall::DistributeSale {
                    token: primary,
                    recipient: chain.first_account()
                }),
            ]
        );
    }

    #[tokio::test]
    async fn test_known_addresses_skip_everything() {
        let chain = FakeChain::new();
        let config = DeployConfig {
            addresses: AddressOverrides {
                allocation_token: Some(Address::with_last_byte(0x0a)),
                ..Default::default()
            },
            ..config(NetworkProfile::Testnet, true)
        };

        let report = run(&chain, &config).await.unwrap();

        let book = config.address_book();
        assert_eq!(report.stable_coin, Resolution::Bound(book.stable_coin.unwrap()));
        assert_eq!(report.allocation_token, Resolution::Bound(Address::with_last_byte(0x0a)));
        assert_eq!(report.primary_token, Resolution::Bound(book.primary_token.unwrap()));
        assert_eq!(report.liquidity, None);
        assert!(chain.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_bound_primary_skips_follow_up_calls() {
        let chain = FakeChain::new();
        let primary = Address::with_last_byte(0x77);
        let config = DeployConfig {
            addresses: AddressOverrides { primary_token: Some(primary), ..Default::default() },
            ..config(NetworkProfile::Ephemeral, true)
        };

        let report = run(&chain, &config).await.unwrap();

        assert_eq!(report.primary_token, Resolution::Bound(primary));
        assert_eq!(chain.deploys().len(), 2);
        assert!(chain.calls().is_empty());
        assert_eq!(report.liquidity, None);
    }

    #[tokio::test]
    async fn test_test_mode_seeds_liquidity() {
        let chain = FakeChain::new();
        let config = config(NetworkProfile::Ephemeral, true);
        let before = unix_now();

        let report = run(&chain, &config).await.unwrap();

        let stable = FakeChain::deployed_address(0);
        let primary = FakeChain::deployed_address(2);
        let book = config.address_book();

        let calls = chain.calls();
        assert_eq!(calls.len(), 6);
        assert_eq!(
            calls[2],
            ContractCall::CreatePair { factory: book.factory, token_a: primary, token_b: stable }
        );
        assert_eq!(
            calls[3],
            ContractCall::Approve {
                token: primary,
                spender: book.router,
                amount: wei(1_500_000_000)
            }
        );
        assert_eq!(
            calls[4],
            ContractCall::Approve { token: stable, spender: book.router, amount: wei(1_500_000) }
        );

        let ContractCall::AddLiquidity(order) = &calls[5] else {
            panic!("expected addLiquidity, got {:?}", calls[5]);
        };
        assert_eq!(order.router, book.router);
        assert_eq!((order.token_a, order.token_b), (primary, stable));
        assert_eq!((order.amount_a, order.amount_b), (wei(1_500_000_000), wei(1_500_000)));
        assert_eq!((order.min_a, order.min_b), (U256::ZERO, U256::ZERO));
        assert_eq!(order.recipient, chain.first_account());
        assert!(order.deadline >= before + 100);
        assert!(order.deadline <= unix_now() + 100);

        assert_eq!(report.liquidity.map(|seed| seed.pair), Some(chain.pair()));
    }

    #[tokio::test]
    async fn test_sale_recipient_override() {
        let chain = FakeChain::new();
        let recipient = Address::with_last_byte(0x55);
        let config = DeployConfig {
            sale_recipient: Some(recipient),
            ..config(NetworkProfile::Ephemeral, false)
        };

        run(&chain, &config).await.unwrap();

        assert!(chain
            .calls()
            .contains(&ContractCall::DistributeSale {
                token: FakeChain::deployed_address(2),
                recipient
            }));
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_steps() {
        // Fails on the allocation token deployment.
        let chain = FakeChain::new().failing_at(1);
        let config = config(NetworkProfile::Ephemeral, true);
        let mut ledger = DeploymentLedger::default();

        let result = bootstrap(&chain, &config, &mut ledger).await;

        assert!(result.is_err());
        assert_eq!(chain.recorded().len(), 1);
        assert_eq!(
            ledger.get(FakeChain::CHAIN_ID, DeploymentTarget::StableCoin),
            Some(FakeChain::deployed_address(0))
        );
        assert_eq!(ledger.get(FakeChain::CHAIN_ID, DeploymentTarget::AllocationToken), None);
    }

    #[tokio::test]
    async fn test_rerun_binds_recorded_contracts() {
        let config = config(NetworkProfile::Ephemeral, true);
        let mut ledger = DeploymentLedger::default();

        let first = FakeChain::new();
        bootstrap(&first, &config, &mut ledger).await.unwrap();
        assert_eq!(ledger.get(FakeChain::CHAIN_ID, DeploymentTarget::Pair), Some(first.pair()));
        assert_eq!(
            ledger.get(FakeChain::CHAIN_ID, DeploymentTarget::PrimaryToken),
            Some(FakeChain::deployed_address(2))
        );

        let deployed = (0..3).map(FakeChain::deployed_address);
        let second = FakeChain::new().with_code(deployed);
        let report = bootstrap(&second, &config, &mut ledger).await.unwrap();

        assert_eq!(report.primary_token, Resolution::Bound(FakeChain::deployed_address(2)));
        assert!(second.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_interrupted_setup_redeploys_primary() {
        // Three deployments, then setStakingStartDate reverts.
        let config = config(NetworkProfile::Ephemeral, true);
        let mut ledger = DeploymentLedger::default();

        let first = FakeChain::new().failing_at(3);
        assert!(bootstrap(&first, &config, &mut ledger).await.is_err());
        assert_eq!(ledger.get(FakeChain::CHAIN_ID, DeploymentTarget::PrimaryToken), None);

        let stable = FakeChain::deployed_address(0);
        let allocation = FakeChain::deployed_address(1);
        let second = FakeChain::new().with_code([stable, allocation]);
        let report = bootstrap(&second, &config, &mut ledger).await.unwrap();

        assert_eq!(report.stable_coin, Resolution::Bound(stable));
        assert_eq!(report.allocation_token, Resolution::Bound(allocation));
        assert!(report.primary_token.is_fresh());
        assert_eq!(second.deploys().len(), 1);
        assert!(matches!(second.calls()[0], ContractCall::SetStakingStartDate { .. }));
        assert!(report.liquidity.is_some());
        assert_eq!(
            ledger.get(FakeChain::CHAIN_ID, DeploymentTarget::PrimaryToken),
            Some(report.primary_token.address())
        );
    }

    #[tokio::test]
    async fn test_failed_seeding_leaves_primary_unrecorded() {
        // Deployments 0..=2, staking 3, sale 4, createPair 5, first approve 6.
        let config = config(NetworkProfile::Ephemeral, true);
        let mut ledger = DeploymentLedger::default();
        let chain = FakeChain::new().failing_at(6);

        assert!(bootstrap(&chain, &config, &mut ledger).await.is_err());

        assert_eq!(ledger.get(FakeChain::CHAIN_ID, DeploymentTarget::PrimaryToken), None);
        assert_eq!(ledger.get(FakeChain::CHAIN_ID, DeploymentTarget::Pair), None);
    }

    #[tokio::test]
    async fn test_restarted_node_deploys_again() {
        let config = config(NetworkProfile::Ephemeral, false);
        let mut ledger = DeploymentLedger::default();
        bootstrap(&FakeChain::new(), &config, &mut ledger).await.unwrap();

        // Same chain id, empty state.
        let restarted = FakeChain::new();
        let report = bootstrap(&restarted, &config, &mut ledger).await.unwrap();

        assert!(report.stable_coin.is_fresh());
        assert!(report.allocation_token.is_fresh());
        assert!(report.primary_token.is_fresh());
        assert_eq!(restarted.deploys().len(), 3);
    }

    #[tokio::test]
    async fn test_huge_deadline_saturates() {
        let mut config = config(NetworkProfile::Ephemeral, true);
        config.liquidity.deadline_secs = u64::MAX;
        let chain = FakeChain::new();

        let report = run(&chain, &config).await.unwrap();

        assert!(report.liquidity.is_some());
        let Some(ContractCall::AddLiquidity(order)) = chain.calls().pop() else {
            panic!("expected addLiquidity as the last call");
        };
        assert_eq!(order.deadline, u64::MAX);
    }

    #[tokio::test]
    async fn test_no_accounts_is_an_error() {
        let chain = FakeChain::new().with_accounts(Vec::new());
        let config = config(NetworkProfile::Ephemeral, false);

        let err = run(&chain, &config).await.unwrap_err();

        assert!(err.to_string().contains("deployer"));
        assert!(chain.recorded().is_empty());
    }
}
