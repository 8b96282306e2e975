use alloy_primitives::B256;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::account::Account;
use crate::models::call::TransactionRequest;
use crate::models::session::{TransactionKind, TransactionRef};
use crate::models::token::{u256_to_biguint, TokenAmount, TokenRef};
use crate::repositories::traits::{TransactionStatusFeed, Wallet};
use crate::utils::errors::{ClaimError, Result};

/// What a confirmed claim's receipt says about the amount received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimSettlement {
    Settled(TokenAmount),
    /// No successor transfer to the claimant in the receipt
    Missing,
    /// Mined but execution failed
    Reverted,
}

/// Submits transactions and follows them until they are mined.
///
/// Confirmation polling has no timeout: a transaction is followed until the
/// chain mines it or the caller cancels.
pub struct TransactionTracker<W: Wallet, F: TransactionStatusFeed> {
    wallet: Arc<W>,
    feed: Arc<F>,
    poll_interval: Duration,
}

impl<W: Wallet, F: TransactionStatusFeed> TransactionTracker<W, F> {
    pub fn new(wallet: Arc<W>, feed: Arc<F>, poll_interval: Duration) -> Self {
        Self {
            wallet,
            feed,
            poll_interval,
        }
    }

    pub async fn connect(&self) -> Result<Account> {
        let address = self.wallet.connect().await?;
        Ok(Account(address))
    }

    /// Resolves as soon as the wallet returns a hash.
    pub async fn submit(&self, request: TransactionRequest, kind: TransactionKind) -> Result<TransactionRef> {
        let signature = request.call.signature();
        match self.wallet.send_transaction(request).await {
            Ok(hash) => {
                info!(%hash, ?kind, "Submitted transaction");
                Ok(TransactionRef::submitted(hash, kind))
            }
            Err(e) => {
                let err = ClaimError::from(e);
                match &err {
                    ClaimError::SubmissionRejected => debug!(?kind, signature, "Transaction rejected in wallet"),
                    _ => warn!(?kind, signature, error = %err, "Transaction submission failed"),
                }
                Err(err)
            }
        }
    }

    /// Polls the status feed until `hash` is no longer pending.
    ///
    /// Returns `false` if `cancel` fired first. Feed errors are logged and
    /// polling continues.
    pub async fn wait_for_confirmation(&self, hash: B256, cancel: &CancellationToken) -> bool {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(%hash, "Confirmation polling cancelled");
                    return false;
                }
                pending = self.feed.is_pending(hash) => match pending {
                    Ok(false) => {
                        debug!(%hash, "Transaction mined");
                        return true;
                    }
                    Ok(true) => {}
                    Err(e) => warn!(%hash, error = %e, "Failed to poll transaction status"),
                },
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(%hash, "Confirmation polling cancelled");
                    return false;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Flip a transaction to its terminal state. Happens once.
    pub fn mark_confirmed(tx: &mut TransactionRef) {
        tx.pending = false;
    }

    /// Read the settled amount from a mined claim's receipt.
    pub async fn settlement(&self, hash: B256, successor: &TokenRef, recipient: &Account) -> ClaimSettlement {
        let receipt = match self.wallet.get_transaction_receipt(hash).await {
            Ok(Some(receipt)) => receipt,
            Ok(None) => {
                warn!(%hash, "Receipt unavailable for mined claim");
                return ClaimSettlement::Missing;
            }
            Err(e) => {
                warn!(%hash, error = %e, "Failed to fetch claim receipt");
                return ClaimSettlement::Missing;
            }
        };

        if !receipt.success {
            warn!(%hash, "Claim transaction reverted");
            return ClaimSettlement::Reverted;
        }

        match receipt.transfer_to(successor.address, recipient.address()) {
            Some(transfer) => {
                let amount = successor.amount(u256_to_biguint(transfer.value));
                info!(%hash, settled = %amount, "Claim settled");
                ClaimSettlement::Settled(amount)
            }
            None => {
                warn!(%hash, error = %ClaimError::ReceiptParseMiss(hash), "Falling back to estimated amount");
                ClaimSettlement::Missing
            }
        }
    }
}
