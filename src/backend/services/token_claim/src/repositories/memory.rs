use alloy_primitives::{keccak256, Address, B256, U256};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{Notify, RwLock};
use tracing::debug;

use crate::models::call::{ContractCall, ReadMode, TransactionRequest};
use crate::models::rate::REBASE_DIVISOR;
use crate::models::receipt::{Receipt, TransferEvent};
use crate::repositories::traits::{ChainReader, TransactionStatusFeed, Wallet};
use crate::utils::errors::ProviderError;

/// How the fabricated wallet answers the next signing prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletResponse {
    Accept,
    Reject,
    Fail(String),
}

#[derive(Debug, Clone)]
struct ClaimContractState {
    legacy: Address,
    successor: Address,
    rate: U256,
    requires_allowance: bool,
}

#[derive(Debug)]
struct ChainState {
    connected: Option<Address>,
    // (token, owner)
    balances: HashMap<(Address, Address), U256>,
    // (token, owner, spender)
    allowances: HashMap<(Address, Address, Address), U256>,
    claim_contracts: HashMap<Address, ClaimContractState>,
    pending: HashMap<B256, TransactionRequest>,
    receipts: HashMap<B256, Receipt>,
    nonce: u64,
    wallet_response: WalletResponse,
    emit_successor_logs: bool,
    hold_receipts: bool,
    reads: HashMap<&'static str, usize>,
    read_failure: Option<String>,
    receipt_requests: usize,
}

impl Default for ChainState {
    fn default() -> Self {
        Self {
            connected: None,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            claim_contracts: HashMap::new(),
            pending: HashMap::new(),
            receipts: HashMap::new(),
            nonce: 0,
            wallet_response: WalletResponse::Accept,
            emit_successor_logs: true,
            hold_receipts: false,
            reads: HashMap::new(),
            read_failure: None,
            receipt_requests: 0,
        }
    }
}

/// A fabricated chain, wallet and status feed in one.
///
/// Transactions stay pending until [`InMemoryChain::mine`] executes them.
/// Only ERC-20 `approve` and the claim contract's `claim` have effects.
#[derive(Debug, Default)]
pub struct InMemoryChain {
    state: RwLock<ChainState>,
    receipts_released: Notify,
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn connect_account(&self, account: Address) {
        self.state.write().await.connected = Some(account);
    }

    pub async fn set_balance(&self, token: Address, owner: Address, amount: U256) {
        self.state.write().await.balances.insert((token, owner), amount);
    }

    pub async fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.state
            .write()
            .await
            .allowances
            .insert((token, owner, spender), amount);
    }

    pub async fn deploy_claim_contract(
        &self,
        claim_contract: Address,
        legacy: Address,
        successor: Address,
        rate: U256,
        requires_allowance: bool,
    ) {
        self.state.write().await.claim_contracts.insert(
            claim_contract,
            ClaimContractState {
                legacy,
                successor,
                rate,
                requires_allowance,
            },
        );
    }

    pub async fn set_claim_rate(&self, claim_contract: Address, rate: U256) -> Result<()> {
        let mut state = self.state.write().await;
        let contract = state
            .claim_contracts
            .get_mut(&claim_contract)
            .ok_or_else(|| anyhow!("No claim contract at {claim_contract}"))?;
        contract.rate = rate;
        Ok(())
    }

    pub async fn set_wallet_response(&self, response: WalletResponse) {
        self.state.write().await.wallet_response = response;
    }

    /// Fail every contract read with `detail` until cleared.
    pub async fn set_read_failure(&self, detail: Option<String>) {
        self.state.write().await.read_failure = detail;
    }

    /// When disabled, mined claims credit the successor token without a log.
    pub async fn set_emit_successor_logs(&self, emit: bool) {
        self.state.write().await.emit_successor_logs = emit;
    }

    /// Park receipt lookups until [`InMemoryChain::release_receipts`].
    pub async fn hold_receipts(&self) {
        self.state.write().await.hold_receipts = true;
    }

    pub async fn release_receipts(&self) {
        self.state.write().await.hold_receipts = false;
        self.receipts_released.notify_waiters();
    }

    pub async fn balance_of(&self, token: Address, owner: Address) -> U256 {
        self.state
            .read()
            .await
            .balances
            .get(&(token, owner))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    pub async fn allowance_of(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.state
            .read()
            .await
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    pub async fn pending_transactions(&self) -> Vec<B256> {
        self.state.read().await.pending.keys().copied().collect()
    }

    /// Number of reads issued for a call signature, e.g. `"getClaimRate()"`.
    pub async fn read_count(&self, signature: &str) -> usize {
        self.state.read().await.reads.get(signature).copied().unwrap_or(0)
    }

    pub async fn receipt_requests(&self) -> usize {
        self.state.read().await.receipt_requests
    }

    /// Execute a pending transaction and store its receipt.
    pub async fn mine(&self, hash: B256) -> Result<Receipt> {
        let mut state = self.state.write().await;
        let request = state
            .pending
            .remove(&hash)
            .ok_or_else(|| anyhow!("Transaction {hash} is not pending"))?;

        let (success, logs) = match &request.call {
            ContractCall::Approve { spender, amount } => {
                state
                    .allowances
                    .insert((request.to, request.from, *spender), *amount);
                (true, Vec::new())
            }
            ContractCall::Claim => match state.claim_contracts.get(&request.to).cloned() {
                Some(contract) => execute_claim(&mut state, &request, &contract),
                None => (false, Vec::new()),
            },
            _ => (true, Vec::new()),
        };

        debug!(%hash, success, "Mined transaction");

        let receipt = Receipt {
            transaction_hash: hash,
            success,
            logs,
        };
        state.receipts.insert(hash, receipt.clone());
        Ok(receipt)
    }

    pub async fn mine_all(&self) -> Result<Vec<Receipt>> {
        let mut receipts = Vec::new();
        for hash in self.pending_transactions().await {
            receipts.push(self.mine(hash).await?);
        }
        Ok(receipts)
    }
}

fn execute_claim(
    state: &mut ChainState,
    request: &TransactionRequest,
    contract: &ClaimContractState,
) -> (bool, Vec<crate::models::receipt::Log>) {
    let holder = request.from;
    let balance = state
        .balances
        .get(&(contract.legacy, holder))
        .copied()
        .unwrap_or(U256::ZERO);

    if balance.is_zero() {
        return (false, Vec::new());
    }

    if contract.requires_allowance {
        let key = (contract.legacy, holder, request.to);
        let allowance = state.allowances.get(&key).copied().unwrap_or(U256::ZERO);
        if allowance < balance {
            return (false, Vec::new());
        }
        state.allowances.insert(key, allowance - balance);
    }

    let minted = balance / U256::from(REBASE_DIVISOR) * contract.rate;

    state.balances.insert((contract.legacy, holder), U256::ZERO);
    *state
        .balances
        .entry((contract.legacy, request.to))
        .or_insert(U256::ZERO) += balance;
    *state
        .balances
        .entry((contract.successor, holder))
        .or_insert(U256::ZERO) += minted;

    let mut logs = vec![TransferEvent {
        token: contract.legacy,
        from: holder,
        to: request.to,
        value: balance,
    }
    .into_log()];

    if state.emit_successor_logs {
        logs.push(
            TransferEvent {
                token: contract.successor,
                from: Address::ZERO,
                to: holder,
                value: minted,
            }
            .into_log(),
        );
    }

    (true, logs)
}

#[async_trait]
impl ChainReader for InMemoryChain {
    async fn read_contract(&self, address: Address, call: ContractCall, _mode: ReadMode) -> Result<U256> {
        let mut state = self.state.write().await;
        *state.reads.entry(call.signature()).or_insert(0) += 1;
        if let Some(detail) = &state.read_failure {
            bail!("{detail}");
        }

        match call {
            ContractCall::BalanceOf { owner } => Ok(state
                .balances
                .get(&(address, owner))
                .copied()
                .unwrap_or(U256::ZERO)),
            ContractCall::Allowance { owner, spender } => Ok(state
                .allowances
                .get(&(address, owner, spender))
                .copied()
                .unwrap_or(U256::ZERO)),
            ContractCall::GetClaimRate => state
                .claim_contracts
                .get(&address)
                .map(|contract| contract.rate)
                .ok_or_else(|| anyhow!("No claim contract at {address}")),
            other => bail!("{} is not a view call", other.signature()),
        }
    }
}

#[async_trait]
impl Wallet for InMemoryChain {
    async fn connect(&self) -> std::result::Result<Address, ProviderError> {
        self.state.read().await.connected.ok_or(ProviderError::Rejected)
    }

    async fn send_transaction(&self, request: TransactionRequest) -> std::result::Result<B256, ProviderError> {
        let mut state = self.state.write().await;
        match state.wallet_response.clone() {
            WalletResponse::Reject => Err(ProviderError::Rejected),
            WalletResponse::Fail(detail) => Err(ProviderError::Failed(detail)),
            WalletResponse::Accept => {
                state.nonce += 1;
                let mut preimage = request.from.to_vec();
                preimage.extend_from_slice(&state.nonce.to_be_bytes());
                let hash = keccak256(&preimage);
                state.pending.insert(hash, request);
                Ok(hash)
            }
        }
    }

    async fn get_transaction_receipt(&self, hash: B256) -> Result<Option<Receipt>> {
        self.state.write().await.receipt_requests += 1;

        loop {
            let released = self.receipts_released.notified();
            if !self.state.read().await.hold_receipts {
                break;
            }
            released.await;
        }

        Ok(self.state.read().await.receipts.get(&hash).cloned())
    }
}

#[async_trait]
impl TransactionStatusFeed for InMemoryChain {
    async fn is_pending(&self, hash: B256) -> Result<bool> {
        Ok(self.state.read().await.pending.contains_key(&hash))
    }
}
