use num_bigint::BigUint;
use tracing::debug;

pub use crate::models::session::ApprovalStatus;

/// Pure transition function of the allowance state machine.
///
/// An unread allowance or an unknown required amount yields `Unknown`.
pub fn derive_status(
    allowance: Option<&BigUint>,
    required: Option<&BigUint>,
    local_pending: bool,
) -> ApprovalStatus {
    match (allowance, required) {
        (Some(allowance), Some(required)) if allowance >= required => ApprovalStatus::Approved,
        (Some(_), Some(_)) if local_pending => ApprovalStatus::Pending,
        (Some(_), Some(_)) => ApprovalStatus::NotApproved,
        _ => ApprovalStatus::Unknown,
    }
}

/// Reconciles the polled on-chain allowance with the optimistic local flag.
///
/// The local pending flag bridges the gap between the wallet acknowledging an
/// approval and the allowance read reflecting it.
#[derive(Debug, Clone, Default)]
pub struct AllowanceTracker {
    allowance: Option<BigUint>,
    required: Option<BigUint>,
    local_pending: bool,
    approval_submitted: bool,
    status: Option<ApprovalStatus>,
    // Bumped by every observation and confirmation
    generation: u64,
}

impl AllowanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> ApprovalStatus {
        self.status.unwrap_or(ApprovalStatus::Unknown)
    }

    pub fn allowance(&self) -> Option<&BigUint> {
        self.allowance.as_ref()
    }

    pub fn required(&self) -> Option<&BigUint> {
        self.required.as_ref()
    }

    pub fn local_pending(&self) -> bool {
        self.local_pending
    }

    pub fn approval_submitted(&self) -> bool {
        self.approval_submitted
    }

    /// Capture before issuing a read, then pass to [`Self::observe_allowance_since`].
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// A fresh allowance read.
    pub fn observe_allowance(&mut self, allowance: BigUint) -> ApprovalStatus {
        self.generation += 1;
        self.allowance = Some(allowance);
        self.reconcile()
    }

    /// Apply a read issued at `generation`.
    ///
    /// Returns `None` and keeps the current state when another read or an
    /// approval confirmation landed after the read was issued.
    pub fn observe_allowance_since(&mut self, allowance: BigUint, generation: u64) -> Option<ApprovalStatus> {
        if generation != self.generation {
            debug!(issued = generation, current = self.generation, "Dropping out-of-order allowance read");
            return None;
        }
        Some(self.observe_allowance(allowance))
    }

    /// The amount the allowance must cover, e.g. after a balance refetch.
    pub fn set_required(&mut self, required: Option<BigUint>) -> ApprovalStatus {
        self.required = required;
        self.reconcile()
    }

    /// The wallet acknowledged an approval with a hash.
    pub fn approval_submitted_now(&mut self) -> ApprovalStatus {
        self.local_pending = true;
        self.approval_submitted = true;
        self.reconcile()
    }

    /// The approval was rejected or failed before a hash existed.
    pub fn approval_failed(&mut self) -> ApprovalStatus {
        self.local_pending = false;
        self.reconcile()
    }

    /// The approval transaction was mined. A fresh read should follow.
    pub fn approval_confirmed(&mut self) -> ApprovalStatus {
        self.generation += 1;
        self.local_pending = false;
        self.reconcile()
    }

    /// Forget session-scoped flags. The last allowance read is kept.
    pub fn reset_session(&mut self) -> ApprovalStatus {
        self.local_pending = false;
        self.approval_submitted = false;
        self.reconcile()
    }

    /// `NotApproved` or `Pending`, or `Approved` right after this session's approval.
    pub fn show_approval_step(&self) -> bool {
        match self.status() {
            ApprovalStatus::NotApproved | ApprovalStatus::Pending => true,
            ApprovalStatus::Approved => self.approval_submitted,
            ApprovalStatus::Unknown => false,
        }
    }

    fn reconcile(&mut self) -> ApprovalStatus {
        let status = derive_status(
            self.allowance.as_ref(),
            self.required.as_ref(),
            self.local_pending,
        );
        if status == ApprovalStatus::Approved {
            self.local_pending = false;
        }
        if self.status != Some(status) {
            debug!(?status, local_pending = self.local_pending, "Approval status changed");
            self.status = Some(status);
        }
        status
    }
}
