use alloy_primitives::B256;
use thiserror::Error;

use crate::models::account::Account;
use crate::models::token::ChainId;

/// Failure kinds surfaced by the claim flow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClaimError {
    #[error("No token deployment for chain {0}")]
    UnsupportedChain(ChainId),

    #[error("Account has no available claim")]
    NoClaimAvailable,

    #[error("Transaction rejected in wallet")]
    SubmissionRejected,

    #[error("Transaction submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Receipt for {0} carries no successor transfer log")]
    ReceiptParseMiss(B256),

    #[error("Malformed address: {0}")]
    MalformedAddress(String),

    #[error("A claim session is already active for {0}")]
    SessionAlreadyActive(Account),

    #[error("Chain read failed: {0}")]
    ChainRead(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors reported by a wallet or provider before a transaction hash exists.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("User rejected the request")]
    Rejected,

    #[error("Provider error: {0}")]
    Failed(String),
}

impl From<ProviderError> for ClaimError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Rejected => ClaimError::SubmissionRejected,
            ProviderError::Failed(detail) => ClaimError::SubmissionFailed(detail),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClaimError>;
