use alloy_primitives::B256;
use serde::Serialize;

use crate::models::account::Account;
use crate::models::session::{ApprovalStatus, ClaimPhase, ClaimSession};
use crate::models::token::{ChainId, TokenAmount};
use crate::services::allowance::AllowanceTracker;
use crate::services::rate_resolver::Resolution;

/// Header badge for the connected account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClaimBadge {
    Hidden,
    Claim,
    /// A submitted claim has no receipt yet
    Claiming,
}

/// User-visible message. Rejections in the wallet never produce one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    NoClaimAvailable,
    SubmissionFailed { detail: String },
    ClaimReverted { hash: B256 },
    /// Balance, rate or allowance could not be read
    ChainReadFailed { detail: String },
}

/// The single state object the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimView {
    pub chain_id: ChainId,
    pub account: Option<Account>,
    /// A connected account that failed address validation
    pub account_malformed: bool,
    /// The active chain has a claim deployment
    pub supported: bool,
    pub phase: ClaimPhase,
    pub balance_v1: Option<TokenAmount>,
    pub rate: Option<u64>,
    pub bonus_percent: Option<f64>,
    pub entitlement: Option<TokenAmount>,
    pub has_available_claim: bool,
    pub approval_required: bool,
    pub approval_status: ApprovalStatus,
    pub show_approval_step: bool,
    pub can_approve: bool,
    pub can_claim: bool,
    pub approval_hash: Option<B256>,
    pub claim_hash: Option<B256>,
    pub claim_confirmed: bool,
    pub settled_amount: Option<TokenAmount>,
    /// Settled amount when known, otherwise the entitlement estimate
    pub display_amount: Option<TokenAmount>,
    pub amount_is_estimate: bool,
    pub badge: ClaimBadge,
    pub notice: Option<Notice>,
}

pub(crate) struct ViewParts<'a> {
    pub chain_id: ChainId,
    pub account: Option<Account>,
    pub account_malformed: bool,
    pub supported: bool,
    pub resolution: Option<&'a Resolution>,
    pub allowance: Option<&'a AllowanceTracker>,
    pub session: Option<&'a ClaimSession>,
    pub notice: Option<&'a Notice>,
}

impl ClaimView {
    pub(crate) fn compose(parts: ViewParts<'_>) -> Self {
        let quote = parts.resolution.and_then(Resolution::quote);
        let session = parts.session;

        let has_available_claim = quote.map_or(false, |q| q.has_available_claim());
        let approval_required = quote.map_or(false, |q| q.deployment.approval_required);

        let (approval_status, show_approval_step) = match (quote, parts.allowance) {
            (Some(_), _) if !approval_required => (ApprovalStatus::Approved, false),
            (Some(_), Some(tracker)) => (tracker.status(), tracker.show_approval_step()),
            _ => (ApprovalStatus::Unknown, false),
        };

        let phase = ClaimPhase::derive(has_available_claim, approval_status, session);
        let in_flight = session.map_or(false, ClaimSession::in_flight);
        let claim_started = session.map_or(false, |s| s.claim.is_some() || s.claim_submitting);
        let valid_target = parts.account.is_some() && !parts.account_malformed;

        let can_approve = valid_target
            && approval_required
            && has_available_claim
            && approval_status == ApprovalStatus::NotApproved
            && !in_flight;
        let can_claim = valid_target
            && has_available_claim
            && approval_status == ApprovalStatus::Approved
            && !in_flight
            && !claim_started;

        let entitlement = quote.and_then(|q| q.entitlement.clone());
        let settled_amount = session.and_then(|s| s.settled_amount.clone());
        let display_amount = match session {
            Some(s) if claim_started => s.display_amount().cloned(),
            _ => entitlement.clone(),
        };

        let claim_pending = session
            .and_then(|s| s.claim.as_ref())
            .map_or(false, |tx| tx.pending);
        let badge = if !valid_target {
            ClaimBadge::Hidden
        } else if claim_pending {
            ClaimBadge::Claiming
        } else if has_available_claim {
            ClaimBadge::Claim
        } else {
            ClaimBadge::Hidden
        };

        let notice = parts.notice.cloned().or_else(|| {
            let nothing_to_claim = quote.map_or(false, |q| q.no_claim_available());
            (nothing_to_claim && !claim_started).then_some(Notice::NoClaimAvailable)
        });

        Self {
            chain_id: parts.chain_id,
            account: parts.account,
            account_malformed: parts.account_malformed,
            supported: parts.supported,
            phase,
            balance_v1: quote.map(|q| q.balance_v1.clone()),
            rate: quote.and_then(|q| q.rate).map(|r| r.raw()),
            bonus_percent: quote.and_then(|q| q.rate).map(|r| r.bonus_percent()),
            entitlement,
            has_available_claim,
            approval_required,
            approval_status,
            show_approval_step,
            can_approve,
            can_claim,
            approval_hash: session.and_then(|s| s.approval.as_ref()).map(|tx| tx.hash),
            claim_hash: session.and_then(|s| s.claim.as_ref()).map(|tx| tx.hash),
            claim_confirmed: session.map_or(false, ClaimSession::claim_confirmed),
            amount_is_estimate: settled_amount.is_none(),
            settled_amount,
            display_amount,
            badge,
            notice,
        }
    }
}
