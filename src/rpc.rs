use alloy::{
    network::{EthereumWallet, ReceiptResponse, TransactionBuilder},
    primitives::{Address, TxHash, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    sol,
    sol_types::{SolCall, SolValue},
    transports::http::reqwest::Url,
};
use miette::{IntoDiagnostic, WrapErr};
use tracing::{debug, info};

use crate::{
    artifacts::ArtifactStore,
    chain::{ChainClient, ChainError, ConstructorArgs, ContractCall, DeployRequest},
};

sol! {
    interface IXtra {
        function setStakingStartDate(uint256 startDate) external;
        function distributeSale(address recipient) external;
        function addInvestors(address[] investors, uint256[] amounts, uint8[] pools) external;
    }

    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address recipient, uint256 amount) external returns (bool);
    }

    interface IPancakeFactory {
        function createPair(address tokenA, address tokenB) external returns (address pair);
        function getPair(address tokenA, address tokenB) external view returns (address pair);
    }

    interface IPancakeRouter01 {
        function addLiquidity(
            address tokenA,
            address tokenB,
            uint256 amountADesired,
            uint256 amountBDesired,
            uint256 amountAMin,
            uint256 amountBMin,
            address to,
            uint256 deadline
        ) external returns (uint256 amountA, uint256 amountB, uint256 liquidity);
    }
}

/// ABI-encoded calldata for a pipeline call.
pub fn encode_call(call: &ContractCall) -> Vec<u8> {
    match call {
        ContractCall::SetStakingStartDate { start, .. } => {
            IXtra::setStakingStartDateCall { startDate: U256::from(*start) }.abi_encode()
        }
        ContractCall::DistributeSale { recipient, .. } => {
            IXtra::distributeSaleCall { recipient: *recipient }.abi_encode()
        }
        ContractCall::AddInvestors { batch, .. } => IXtra::addInvestorsCall {
            investors: batch.addresses.clone(),
            amounts: batch.amounts.clone(),
            pools: batch.pools.clone(),
        }
        .abi_encode(),
        ContractCall::Approve { spender, amount, .. } => {
            IERC20::approveCall { spender: *spender, amount: *amount }.abi_encode()
        }
        ContractCall::Transfer { recipient, amount, .. } => {
            IERC20::transferCall { recipient: *recipient, amount: *amount }.abi_encode()
        }
        ContractCall::CreatePair { token_a, token_b, .. } => {
            IPancakeFactory::createPairCall { tokenA: *token_a, tokenB: *token_b }.abi_encode()
        }
        ContractCall::AddLiquidity(order) => IPancakeRouter01::addLiquidityCall {
            tokenA: order.token_a,
            tokenB: order.token_b,
            amountADesired: order.amount_a,
            amountBDesired: order.amount_b,
            amountAMin: order.min_a,
            amountBMin: order.min_b,
            to: order.recipient,
            deadline: U256::from(order.deadline),
        }
        .abi_encode(),
    }
}

/// Creation bytecode followed by the ABI-encoded constructor arguments.
pub fn deploy_code(bytecode: Vec<u8>, args: &ConstructorArgs) -> Vec<u8> {
    let encoded_args = match args {
        ConstructorArgs::Token { name, symbol } => {
            (name.clone(), symbol.clone()).abi_encode_params()
        }
        ConstructorArgs::PrimaryToken { factory, stable_coin, allocation_token } => {
            (*factory, *stable_coin, *allocation_token).abi_encode_params()
        }
    };

    let mut code = bytecode;
    code.extend_from_slice(&encoded_args);
    code
}

/// JSON-RPC backed [`ChainClient`].
///
/// Transactions are signed locally when a private key is given, otherwise they are sent from
/// the first account unlocked on the node.
pub struct RpcClient {
    provider: DynProvider,
    sender: Address,
    artifacts: ArtifactStore,
}

impl RpcClient {
    pub async fn connect(
        rpc_url: &str,
        private_key: Option<&str>,
        artifacts: ArtifactStore,
    ) -> miette::Result<Self> {
        let url: Url = rpc_url
            .parse()
            .into_diagnostic()
            .wrap_err(format!("Invalid RPC URL '{rpc_url}'"))?;

        let (provider, signer_address) = match private_key {
            Some(key) => {
                let signer: PrivateKeySigner = key
                    .trim()
                    .parse()
                    .into_diagnostic()
                    .wrap_err("Invalid deployer private key")?;
                let address = signer.address();
                let provider = ProviderBuilder::new()
                    .wallet(EthereumWallet::from(signer))
                    .connect_http(url)
                    .erased();
                (provider, Some(address))
            }
            None => (
                ProviderBuilder::new()
                    .connect_http(url)
                    .erased(),
                None,
            ),
        };

        let sender = match signer_address {
            Some(address) => address,
            None => provider
                .get_accounts()
                .await
                .into_diagnostic()
                .wrap_err("Failed to list node accounts")?
                .first()
                .copied()
                .ok_or(ChainError::NoAccounts)?,
        };
        info!("Sending transactions from {sender}");

        Ok(Self { provider, sender, artifacts })
    }

    async fn submit(&self, tx: TransactionRequest, label: String) -> Result<TxHash, ChainError> {
        let receipt = self
            .provider
            .send_transaction(tx.with_from(self.sender))
            .await?
            .get_receipt()
            .await?;

        let tx_hash = receipt.transaction_hash();
        if !receipt.status() {
            return Err(ChainError::Reverted { call: label, tx_hash });
        }
        Ok(tx_hash)
    }
}

impl ChainClient for RpcClient {
    async fn accounts(&self) -> Result<Vec<Address>, ChainError> {
        let mut accounts = vec![self.sender];
        accounts.extend(
            self.provider
                .get_accounts()
                .await?
                .into_iter()
                .filter(|account| *account != self.sender),
        );
        Ok(accounts)
    }

    /// The signing account fixed at connection time.
    async fn deployer(&self) -> Result<Address, ChainError> {
        Ok(self.sender)
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn has_code(&self, address: Address) -> Result<bool, ChainError> {
        let code = self.provider.get_code_at(address).await?;
        Ok(!code.is_empty())
    }

    async fn deploy(&self, request: &DeployRequest) -> Result<Address, ChainError> {
        let bytecode = self.artifacts.bytecode(request.kind)?;
        debug!("Loaded {} bytes of bytecode for the {}", bytecode.len(), request.kind);

        let tx = TransactionRequest::default()
            .with_deploy_code(deploy_code(bytecode, &request.args))
            .with_from(self.sender);
        let receipt = self
            .provider
            .send_transaction(tx)
            .await?
            .get_receipt()
            .await?;

        let tx_hash = receipt.transaction_hash();
        if !receipt.status() {
            return Err(ChainError::Reverted { call: format!("deploy {}", request.kind), tx_hash });
        }
        receipt
            .contract_address()
            .ok_or(ChainError::MissingContractAddress { kind: request.kind, tx_hash })
    }

    async fn send(&self, call: &ContractCall) -> Result<TxHash, ChainError> {
        let tx = TransactionRequest::default()
            .with_to(call.target())
            .with_input(encode_call(call));
        debug!("Sending {call} to {}", call.target());
        self.submit(tx, call.to_string()).await
    }

    async fn pair_address(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
    ) -> Result<Address, ChainError> {
        let calldata =
            IPancakeFactory::getPairCall { tokenA: token_a, tokenB: token_b }.abi_encode();
        let tx = TransactionRequest::default()
            .with_to(factory)
            .with_input(calldata);
        let output = self.provider.call(tx).await?;
        let pair = IPancakeFactory::getPairCall::abi_decode_returns(&output)?;
        Ok(pair)
    }
}
