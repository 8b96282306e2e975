use alloy_primitives::B256;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::account::Account;
use crate::models::token::{ChainId, TokenAmount};

/// Approval status of the claim contract's allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ApprovalStatus {
    /// Allowance not read yet
    Unknown,
    NotApproved,
    /// Approval submitted, allowance not yet sufficient
    Pending,
    Approved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionKind {
    Approval,
    Claim,
}

/// A submitted transaction. Only the transaction tracker flips `pending`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRef {
    pub hash: B256,
    pub kind: TransactionKind,
    pub pending: bool,
    pub submitted_at: DateTime<Utc>,
}

impl TransactionRef {
    pub fn submitted(hash: B256, kind: TransactionKind) -> Self {
        Self {
            hash,
            kind,
            pending: true,
            submitted_at: Utc::now(),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        !self.pending
    }
}

/// State of one claim attempt. Ephemeral, discarded on dismissal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimSession {
    pub id: Uuid,
    pub account: Account,
    pub chain_id: ChainId,
    pub approval: Option<TransactionRef>,
    pub claim: Option<TransactionRef>,
    /// Wallet prompt open for the approval, no hash yet
    pub approval_submitting: bool,
    /// Wallet prompt open for the claim, no hash yet
    pub claim_submitting: bool,
    /// Entitlement at the moment the claim was submitted
    pub estimated_amount: Option<TokenAmount>,
    /// Amount read back from the claim receipt
    pub settled_amount: Option<TokenAmount>,
    pub created_at: DateTime<Utc>,
}

impl ClaimSession {
    pub fn new(account: Account, chain_id: ChainId) -> Self {
        Self {
            id: Uuid::new_v4(),
            account,
            chain_id,
            approval: None,
            claim: None,
            approval_submitting: false,
            claim_submitting: false,
            estimated_amount: None,
            settled_amount: None,
            created_at: Utc::now(),
        }
    }

    /// Whether a wallet prompt or unconfirmed transaction belongs to this session.
    pub fn in_flight(&self) -> bool {
        self.approval_submitting
            || self.claim_submitting
            || self.approval.as_ref().map_or(false, |tx| tx.pending)
            || self.claim.as_ref().map_or(false, |tx| tx.pending)
    }

    pub fn approval_submitted(&self) -> bool {
        self.approval.is_some()
    }

    pub fn claim_confirmed(&self) -> bool {
        self.claim.as_ref().map_or(false, TransactionRef::is_confirmed)
    }

    /// Settled amount, or the estimate when the receipt carried no transfer.
    pub fn display_amount(&self) -> Option<&TokenAmount> {
        self.settled_amount.as_ref().or(self.estimated_amount.as_ref())
    }
}

/// Phase of the end-to-end claim flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClaimPhase {
    Idle,
    ApprovalRequired,
    ApprovalPending,
    ReadyToClaim,
    Claiming,
    Claimed,
}

impl ClaimPhase {
    pub fn derive(
        has_available_claim: bool,
        status: ApprovalStatus,
        session: Option<&ClaimSession>,
    ) -> Self {
        if let Some(session) = session {
            if let Some(claim) = &session.claim {
                return if claim.pending {
                    ClaimPhase::Claiming
                } else {
                    ClaimPhase::Claimed
                };
            }
            if session.claim_submitting {
                return ClaimPhase::Claiming;
            }
        }

        if !has_available_claim {
            return ClaimPhase::Idle;
        }

        match status {
            ApprovalStatus::Unknown => ClaimPhase::Idle,
            ApprovalStatus::NotApproved => ClaimPhase::ApprovalRequired,
            ApprovalStatus::Pending => ClaimPhase::ApprovalPending,
            ApprovalStatus::Approved => ClaimPhase::ReadyToClaim,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;
    use num_bigint::BigUint;

    fn session() -> ClaimSession {
        ClaimSession::new(Account(Address::repeat_byte(1)), 1)
    }

    #[test]
    fn phase_follows_approval_status_without_session() {
        assert_eq!(ClaimPhase::derive(true, ApprovalStatus::Unknown, None), ClaimPhase::Idle);
        assert_eq!(
            ClaimPhase::derive(true, ApprovalStatus::NotApproved, None),
            ClaimPhase::ApprovalRequired
        );
        assert_eq!(
            ClaimPhase::derive(true, ApprovalStatus::Pending, None),
            ClaimPhase::ApprovalPending
        );
        assert_eq!(
            ClaimPhase::derive(true, ApprovalStatus::Approved, None),
            ClaimPhase::ReadyToClaim
        );
        assert_eq!(ClaimPhase::derive(false, ApprovalStatus::Approved, None), ClaimPhase::Idle);
    }

    #[test]
    fn claim_transaction_overrides_balance() {
        let mut s = session();
        s.claim = Some(TransactionRef::submitted(B256::ZERO, TransactionKind::Claim));
        assert_eq!(
            ClaimPhase::derive(false, ApprovalStatus::Approved, Some(&s)),
            ClaimPhase::Claiming
        );
        assert!(s.in_flight());

        s.claim.as_mut().unwrap().pending = false;
        assert_eq!(
            ClaimPhase::derive(false, ApprovalStatus::NotApproved, Some(&s)),
            ClaimPhase::Claimed
        );
        assert!(!s.in_flight());
        assert!(s.claim_confirmed());
    }

    #[test]
    fn display_amount_prefers_settled() {
        let mut s = session();
        s.estimated_amount = Some(TokenAmount::new(BigUint::from(1000u32), 0));
        assert_eq!(s.display_amount().unwrap().raw(), &BigUint::from(1000u32));

        s.settled_amount = Some(TokenAmount::new(BigUint::from(1050u32), 0));
        assert_eq!(s.display_amount().unwrap().raw(), &BigUint::from(1050u32));
    }
}
