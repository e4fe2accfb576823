//! In-memory chain used by the pipeline tests.
//!
//! Records every operation in order and can be told to fail at a given operation index.

use std::{collections::BTreeSet, sync::Mutex};

use alloy::primitives::{Address, TxHash};

use crate::chain::{ChainClient, ChainError, ContractCall, DeployRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Deploy(DeployRequest),
    Send(ContractCall),
}

pub struct FakeChain {
    accounts: Vec<Address>,
    pair: Address,
    fail_at: Option<usize>,
    log: Mutex<Vec<Recorded>>,
    code: Mutex<BTreeSet<Address>>,
}

impl FakeChain {
    pub const CHAIN_ID: u64 = 1337;

    /// Six local accounts `0xf0..0xf5`.
    pub fn new() -> Self {
        Self {
            accounts: (0xf0..=0xf5)
                .map(Address::with_last_byte)
                .collect(),
            pair: Address::repeat_byte(0xaa),
            fail_at: None,
            log: Mutex::new(Vec::new()),
            code: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn with_accounts(mut self, accounts: Vec<Address>) -> Self {
        self.accounts = accounts;
        self
    }

    /// Contracts that already exist before the first operation.
    pub fn with_code(self, addresses: impl IntoIterator<Item = Address>) -> Self {
        self.code
            .lock()
            .unwrap()
            .extend(addresses);
        self
    }

    /// Make the operation with zero-based index `index` revert.
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    pub fn pair(&self) -> Address {
        self.pair
    }

    pub fn first_account(&self) -> Address {
        self.accounts[0]
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    pub fn deploys(&self) -> Vec<DeployRequest> {
        self.recorded()
            .into_iter()
            .filter_map(|op| match op {
                Recorded::Deploy(request) => Some(request),
                Recorded::Send(_) => None,
            })
            .collect()
    }

    pub fn calls(&self) -> Vec<ContractCall> {
        self.recorded()
            .into_iter()
            .filter_map(|op| match op {
                Recorded::Send(call) => Some(call),
                Recorded::Deploy(_) => None,
            })
            .collect()
    }

    /// Address the n-th recorded operation would produce if it were a deployment.
    pub fn deployed_address(index: usize) -> Address {
        Address::with_last_byte(0x10 + index as u8)
    }

    fn push(&self, op: Recorded) -> Result<usize, ChainError> {
        let mut log = self.log.lock().unwrap();
        let index = log.len();
        if self.fail_at == Some(index) {
            let call = match &op {
                Recorded::Deploy(request) => format!("deploy {}", request.kind),
                Recorded::Send(call) => call.to_string(),
            };
            return Err(ChainError::Reverted { call, tx_hash: TxHash::with_last_byte(index as u8) });
        }
        log.push(op);
        Ok(index)
    }
}

impl ChainClient for FakeChain {
    async fn accounts(&self) -> Result<Vec<Address>, ChainError> {
        Ok(self.accounts.clone())
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(Self::CHAIN_ID)
    }

    async fn has_code(&self, address: Address) -> Result<bool, ChainError> {
        Ok(self
            .code
            .lock()
            .unwrap()
            .contains(&address))
    }

    async fn deploy(&self, request: &DeployRequest) -> Result<Address, ChainError> {
        let index = self.push(Recorded::Deploy(request.clone()))?;
        let address = Self::deployed_address(index);
        self.code.lock().unwrap().insert(address);
        Ok(address)
    }

    async fn send(&self, call: &ContractCall) -> Result<TxHash, ChainError> {
        let index = self.push(Recorded::Send(call.clone()))?;
        Ok(TxHash::with_last_byte(index as u8))
    }

    async fn pair_address(
        &self,
        _factory: Address,
        _token_a: Address,
        _token_b: Address,
    ) -> Result<Address, ChainError> {
        Ok(self.pair)
    }
}
