use alloy_primitives::{Address, B256, U256};
use anyhow::Result;
use async_trait::async_trait;

use crate::models::call::{ContractCall, ReadMode, TransactionRequest};
use crate::models::receipt::Receipt;
use crate::utils::errors::ProviderError;

/// Read access to contract state.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Read a single-word view call on `address`.
    async fn read_contract(&self, address: Address, call: ContractCall, mode: ReadMode) -> Result<U256>;
}

/// The connected wallet and its provider.
#[async_trait]
pub trait Wallet: Send + Sync {
    async fn connect(&self) -> std::result::Result<Address, ProviderError>;

    /// Sign and broadcast; resolves once the wallet acknowledges with a hash.
    async fn send_transaction(&self, request: TransactionRequest) -> std::result::Result<B256, ProviderError>;

    /// `None` until the transaction is mined.
    async fn get_transaction_receipt(&self, hash: B256) -> Result<Option<Receipt>>;
}

/// Pending-transaction status maintained by the host application.
#[async_trait]
pub trait TransactionStatusFeed: Send + Sync {
    async fn is_pending(&self, hash: B256) -> Result<bool>;
}
