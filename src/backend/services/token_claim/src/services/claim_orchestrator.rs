use alloy_primitives::B256;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::view::{ClaimView, Notice, ViewParts};
use crate::config::ClaimConfig;
use crate::models::account::{Account, ClaimContext};
use crate::models::call::{ContractCall, TransactionRequest};
use crate::models::session::{ApprovalStatus, ClaimSession, TransactionKind};
use crate::models::token::{biguint_to_u256, ChainId, Deployment, DeploymentRegistry};
use crate::repositories::traits::{ChainReader, TransactionStatusFeed, Wallet};
use crate::services::allowance::AllowanceTracker;
use crate::services::rate_resolver::{RateResolver, Resolution};
use crate::services::transaction_tracker::{ClaimSettlement, TransactionTracker};
use crate::utils::errors::{ClaimError, Result};

struct ActiveSession {
    session: ClaimSession,
    cancel: CancellationToken,
}

/// Everything tracked for one account on its active chain.
struct AccountState {
    chain_id: ChainId,
    resolution: Option<Resolution>,
    allowance: AllowanceTracker,
    session: Option<ActiveSession>,
    notice: Option<Notice>,
}

impl AccountState {
    fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            resolution: None,
            allowance: AllowanceTracker::new(),
            session: None,
            notice: None,
        }
    }

    fn apply_resolution(&mut self, resolution: Resolution) {
        let required = resolution
            .quote()
            .filter(|q| q.has_available_claim())
            .and_then(|q| q.required_allowance());
        self.allowance.set_required(required);
        self.resolution = Some(resolution);
    }

    fn end_session(&mut self) {
        if let Some(active) = self.session.take() {
            active.cancel.cancel();
        }
        self.allowance.reset_session();
        self.notice = None;
    }

    /// Drop a session that never got a transaction hash.
    fn discard_if_empty(&mut self) {
        let empty = self.session.as_ref().map_or(false, |active| {
            active.session.approval.is_none() && active.session.claim.is_none()
        });
        if empty {
            if let Some(active) = self.session.take() {
                active.cancel.cancel();
            }
        }
    }
}

fn state_for(accounts: &mut HashMap<Account, AccountState>, account: Account, chain_id: ChainId) -> &mut AccountState {
    let state = accounts
        .entry(account)
        .or_insert_with(|| AccountState::new(chain_id));
    if state.chain_id != chain_id {
        debug!(%account, from = state.chain_id, to = chain_id, "Chain switched, resetting claim state");
        state.end_session();
        *state = AccountState::new(chain_id);
    }
    state
}

/// The account state, only if `session_id` is still its live session.
fn live_state<'a>(
    accounts: &'a mut HashMap<Account, AccountState>,
    account: &Account,
    session_id: Uuid,
    cancel: &CancellationToken,
) -> Option<&'a mut AccountState> {
    if cancel.is_cancelled() {
        return None;
    }
    accounts
        .get_mut(account)
        .filter(|state| state.session.as_ref().map(|a| a.session.id) == Some(session_id))
}

struct Inner<R: ChainReader, W: Wallet, F: TransactionStatusFeed> {
    resolver: RateResolver<R>,
    tracker: TransactionTracker<W, F>,
    accounts: RwLock<HashMap<Account, AccountState>>,
    shutdown: CancellationToken,
}

/// Drives the approve-then-claim flow and owns all per-account claim state.
///
/// Watchers spawned for submitted transactions run on the tokio runtime and
/// are cancelled by [`ClaimOrchestrator::dismiss`] or
/// [`ClaimOrchestrator::shutdown`].
pub struct ClaimOrchestrator<R: ChainReader, W: Wallet, F: TransactionStatusFeed> {
    inner: Arc<Inner<R, W, F>>,
}

impl<R: ChainReader, W: Wallet, F: TransactionStatusFeed> Clone for ClaimOrchestrator<R, W, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R, W, F> ClaimOrchestrator<R, W, F>
where
    R: ChainReader + 'static,
    W: Wallet + 'static,
    F: TransactionStatusFeed + 'static,
{
    pub fn new(
        reader: Arc<R>,
        wallet: Arc<W>,
        feed: Arc<F>,
        registry: DeploymentRegistry,
        poll_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                resolver: RateResolver::new(reader, Arc::new(registry)),
                tracker: TransactionTracker::new(wallet, feed, poll_interval),
                accounts: RwLock::new(HashMap::new()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn from_config(config: &ClaimConfig, reader: Arc<R>, wallet: Arc<W>, feed: Arc<F>) -> Result<Self> {
        Ok(Self::new(
            reader,
            wallet,
            feed,
            config.registry()?,
            config.poll_interval(),
        ))
    }

    /// Ask the wallet for its account and bind it to `chain_id`.
    pub async fn connect(&self, chain_id: ChainId) -> Result<ClaimContext> {
        let account = self.inner.tracker.connect().await?;
        info!(%account, chain_id, "Wallet connected");
        Ok(ClaimContext::new(chain_id, account.to_string()))
    }

    /// Read balance, rate and allowance and return the resulting view.
    ///
    /// A failed chain read keeps the cached state and sets a
    /// [`Notice::ChainReadFailed`] instead of returning an error.
    pub async fn refresh(&self, ctx: &ClaimContext) -> Result<ClaimView> {
        let account = match ctx.target() {
            Some(Ok(account)) => account,
            _ => return Ok(self.view(ctx).await),
        };

        let generation = self.allowance_generation(&account, ctx.chain_id).await;

        let resolution = match self.inner.resolver.resolve(ctx.chain_id, &account).await {
            Ok(resolution) => resolution,
            Err(err) => return Ok(self.record_read_failure(ctx, account, err).await),
        };

        // Allowance logic only runs when there is something to claim
        let allowance = match resolution.quote() {
            Some(quote) if quote.deployment.approval_required && quote.has_available_claim() => self
                .inner
                .resolver
                .allowance(&quote.deployment, &account)
                .await
                .map(Some),
            _ => Ok(None),
        };

        let mut accounts = self.inner.accounts.write().await;
        let state = state_for(&mut accounts, account, ctx.chain_id);
        state.apply_resolution(resolution);
        if matches!(state.notice, Some(Notice::ChainReadFailed { .. })) {
            state.notice = None;
        }

        match allowance {
            Ok(Some(allowance)) => {
                if state.allowance.observe_allowance_since(allowance, generation).is_none() {
                    debug!(%account, "Allowance changed during refresh, keeping newer read");
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(%account, error = %err, "Failed to read allowance");
                state.notice = Some(Notice::ChainReadFailed {
                    detail: err.to_string(),
                });
            }
        }

        Ok(self.compose(ctx, Some(account), Some(&*state)))
    }

    async fn allowance_generation(&self, account: &Account, chain_id: ChainId) -> u64 {
        self.inner
            .accounts
            .read()
            .await
            .get(account)
            .filter(|state| state.chain_id == chain_id)
            .map_or(0, |state| state.allowance.generation())
    }

    async fn record_read_failure(&self, ctx: &ClaimContext, account: Account, err: ClaimError) -> ClaimView {
        warn!(%account, chain_id = ctx.chain_id, error = %err, "Failed to resolve claim");
        let mut accounts = self.inner.accounts.write().await;
        let state = state_for(&mut accounts, account, ctx.chain_id);
        state.notice = Some(Notice::ChainReadFailed {
            detail: err.to_string(),
        });
        self.compose(ctx, Some(account), Some(&*state))
    }

    /// Current view from cached state, without chain reads.
    pub async fn view(&self, ctx: &ClaimContext) -> ClaimView {
        match ctx.target() {
            Some(Ok(account)) => {
                let accounts = self.inner.accounts.read().await;
                let state = accounts
                    .get(&account)
                    .filter(|state| state.chain_id == ctx.chain_id);
                self.compose(ctx, Some(account), state)
            }
            _ => self.compose(ctx, None, None),
        }
    }

    /// Submit an approval covering the required amount.
    ///
    /// Does nothing unless the view allows approving. Wallet rejections reset
    /// silently; other submission failures set a notice.
    pub async fn approve(&self, ctx: &ClaimContext) -> Result<ClaimView> {
        let account = match ctx.target() {
            Some(Ok(account)) => account,
            _ => return Ok(self.view(ctx).await),
        };

        let (request, session_id, cancel, deployment) = {
            let mut accounts = self.inner.accounts.write().await;
            let state = state_for(&mut accounts, account, ctx.chain_id);
            ensure_no_attempt_in_flight(state, account)?;

            let quote = match state.resolution.as_ref().and_then(Resolution::quote) {
                Some(quote)
                    if quote.deployment.approval_required
                        && quote.has_available_claim()
                        && state.allowance.status() == ApprovalStatus::NotApproved =>
                {
                    quote.clone()
                }
                _ => {
                    debug!(%account, "Approval not available");
                    return Ok(self.compose(ctx, Some(account), Some(&*state)));
                }
            };

            let Some(amount) = quote.required_allowance().as_ref().and_then(biguint_to_u256) else {
                state.notice = Some(Notice::SubmissionFailed {
                    detail: "Required amount exceeds uint256".to_string(),
                });
                return Ok(self.compose(ctx, Some(account), Some(&*state)));
            };

            let active = self.session_for(state, account, ctx.chain_id);
            active.session.approval_submitting = true;
            let session_id = active.session.id;
            let cancel = active.cancel.clone();
            state.notice = None;

            let deployment = quote.deployment;
            let request = TransactionRequest::new(
                account.address(),
                deployment.legacy.address,
                ContractCall::Approve {
                    spender: deployment.claim_contract,
                    amount,
                },
            );
            (request, session_id, cancel, deployment)
        };

        let outcome = self.inner.tracker.submit(request, TransactionKind::Approval).await;

        let mut accounts = self.inner.accounts.write().await;
        let Some(state) = live_state(&mut accounts, &account, session_id, &cancel) else {
            debug!(%account, "Session ended while approval was being signed");
            drop(accounts);
            return Ok(self.view(ctx).await);
        };

        match outcome {
            Ok(tx) => {
                let hash = tx.hash;
                if let Some(active) = state.session.as_mut() {
                    active.session.approval_submitting = false;
                    active.session.approval = Some(tx);
                }
                state.allowance.approval_submitted_now();

                let inner = Arc::clone(&self.inner);
                tokio::spawn(inner.watch_approval(account, deployment, session_id, hash, cancel));
            }
            Err(err) => {
                if let Some(active) = state.session.as_mut() {
                    active.session.approval_submitting = false;
                }
                state.allowance.approval_failed();
                record_failure(state, err);
                state.discard_if_empty();
            }
        }

        Ok(self.compose(ctx, Some(account), Some(&*state)))
    }

    /// Submit the claim. Does nothing unless the entry guard holds.
    pub async fn claim(&self, ctx: &ClaimContext) -> Result<ClaimView> {
        let account = match ctx.target() {
            Some(Ok(account)) => account,
            Some(Err(err)) => {
                debug!(error = %err, "Claim disabled for malformed account");
                return Ok(self.view(ctx).await);
            }
            None => return Ok(self.view(ctx).await),
        };

        let (request, session_id, cancel, deployment) = {
            let mut accounts = self.inner.accounts.write().await;
            let state = state_for(&mut accounts, account, ctx.chain_id);
            ensure_no_attempt_in_flight(state, account)?;
            if state
                .session
                .as_ref()
                .map_or(false, |active| active.session.claim.is_some())
            {
                debug!(%account, "Claim already submitted in this session");
                return Ok(self.compose(ctx, Some(account), Some(&*state)));
            }

            let quote = match state.resolution.as_ref().and_then(Resolution::quote) {
                Some(quote) if quote.has_available_claim() => quote.clone(),
                _ => {
                    debug!(%account, "No available claim");
                    return Ok(self.compose(ctx, Some(account), Some(&*state)));
                }
            };

            let approved =
                !quote.deployment.approval_required || state.allowance.status() == ApprovalStatus::Approved;
            if !approved {
                debug!(%account, status = ?state.allowance.status(), "Claim requires approval first");
                return Ok(self.compose(ctx, Some(account), Some(&*state)));
            }

            let active = self.session_for(state, account, ctx.chain_id);
            active.session.claim_submitting = true;
            active.session.estimated_amount = quote.entitlement.clone();
            let session_id = active.session.id;
            let cancel = active.cancel.clone();
            state.notice = None;

            let deployment = quote.deployment;
            let request = TransactionRequest::new(account.address(), deployment.claim_contract, ContractCall::Claim);
            (request, session_id, cancel, deployment)
        };

        let outcome = self.inner.tracker.submit(request, TransactionKind::Claim).await;

        let mut accounts = self.inner.accounts.write().await;
        let Some(state) = live_state(&mut accounts, &account, session_id, &cancel) else {
            debug!(%account, "Session ended while claim was being signed");
            drop(accounts);
            return Ok(self.view(ctx).await);
        };

        match outcome {
            Ok(tx) => {
                let hash = tx.hash;
                if let Some(active) = state.session.as_mut() {
                    active.session.claim_submitting = false;
                    active.session.claim = Some(tx);
                }

                let inner = Arc::clone(&self.inner);
                tokio::spawn(inner.watch_claim(account, deployment, session_id, hash, cancel));
            }
            Err(err) => {
                if let Some(active) = state.session.as_mut() {
                    active.session.claim_submitting = false;
                    active.session.estimated_amount = None;
                }
                record_failure(state, err);
                state.discard_if_empty();
            }
        }

        Ok(self.compose(ctx, Some(account), Some(&*state)))
    }

    /// Discard the current session and stop its watchers.
    pub async fn dismiss(&self, ctx: &ClaimContext) -> ClaimView {
        if let Some(Ok(account)) = ctx.target() {
            let mut accounts = self.inner.accounts.write().await;
            if let Some(state) = accounts.get_mut(&account) {
                if state.session.is_some() {
                    info!(%account, "Claim session dismissed");
                }
                state.end_session();
            }
        }
        self.view(ctx).await
    }

    pub async fn active_session(&self, account: &Account) -> Option<ClaimSession> {
        self.inner
            .accounts
            .read()
            .await
            .get(account)
            .and_then(|state| state.session.as_ref())
            .map(|active| active.session.clone())
    }

    pub async fn invalidate_rate(&self, chain_id: ChainId) {
        self.inner.resolver.invalidate_rate(chain_id).await;
    }

    pub async fn invalidate_balance(&self, chain_id: ChainId, account: &Account) {
        self.inner.resolver.invalidate_balance(chain_id, account).await;
    }

    /// Cancel every watcher. Later watcher results are discarded.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    fn session_for<'a>(&self, state: &'a mut AccountState, account: Account, chain_id: ChainId) -> &'a mut ActiveSession {
        let shutdown = &self.inner.shutdown;
        state.session.get_or_insert_with(|| {
            let session = ClaimSession::new(account, chain_id);
            info!(%account, session = %session.id, "Claim session started");
            ActiveSession {
                session,
                cancel: shutdown.child_token(),
            }
        })
    }

    fn compose(&self, ctx: &ClaimContext, account: Option<Account>, state: Option<&AccountState>) -> ClaimView {
        ClaimView::compose(ViewParts {
            chain_id: ctx.chain_id,
            account,
            account_malformed: matches!(ctx.target(), Some(Err(_))),
            supported: self.inner.resolver.registry().resolve(ctx.chain_id).is_some(),
            resolution: state.and_then(|s| s.resolution.as_ref()),
            allowance: state.map(|s| &s.allowance),
            session: state.and_then(|s| s.session.as_ref()).map(|a| &a.session),
            notice: state.and_then(|s| s.notice.as_ref()),
        })
    }
}

fn ensure_no_attempt_in_flight(state: &AccountState, account: Account) -> Result<()> {
    match &state.session {
        Some(active) if active.session.in_flight() => {
            warn!(%account, session = %active.session.id, "Refusing second claim attempt");
            Err(ClaimError::SessionAlreadyActive(account))
        }
        _ => Ok(()),
    }
}

fn record_failure(state: &mut AccountState, err: ClaimError) {
    state.notice = match err {
        ClaimError::SubmissionRejected => None,
        other => Some(Notice::SubmissionFailed {
            detail: other.to_string(),
        }),
    };
}

impl<R, W, F> Inner<R, W, F>
where
    R: ChainReader + 'static,
    W: Wallet + 'static,
    F: TransactionStatusFeed + 'static,
{
    async fn watch_approval(
        self: Arc<Self>,
        account: Account,
        deployment: Deployment,
        session_id: Uuid,
        hash: B256,
        cancel: CancellationToken,
    ) {
        if !self.tracker.wait_for_confirmation(hash, &cancel).await {
            return;
        }

        let allowance = self.resolver.allowance(&deployment, &account).await;

        let mut accounts = self.accounts.write().await;
        let Some(state) = live_state(&mut accounts, &account, session_id, &cancel) else {
            debug!(%hash, "Discarding stale approval confirmation");
            return;
        };

        if let Some(tx) = state.session.as_mut().and_then(|a| a.session.approval.as_mut()) {
            TransactionTracker::<W, F>::mark_confirmed(tx);
        }
        state.allowance.approval_confirmed();

        match allowance {
            Ok(allowance) => {
                let status = state.allowance.observe_allowance(allowance);
                info!(%account, %hash, ?status, "Approval confirmed");
            }
            Err(e) => warn!(%account, %hash, error = %e, "Failed to re-read allowance after approval"),
        }
    }

    async fn watch_claim(
        self: Arc<Self>,
        account: Account,
        deployment: Deployment,
        session_id: Uuid,
        hash: B256,
        cancel: CancellationToken,
    ) {
        if !self.tracker.wait_for_confirmation(hash, &cancel).await {
            return;
        }

        let settlement = self
            .tracker
            .settlement(hash, &deployment.successor, &account)
            .await;

        {
            let mut accounts = self.accounts.write().await;
            let Some(state) = live_state(&mut accounts, &account, session_id, &cancel) else {
                debug!(%hash, "Discarding stale claim confirmation");
                return;
            };
            let Some(active) = state.session.as_mut() else {
                return;
            };

            match settlement {
                ClaimSettlement::Reverted => {
                    active.session.claim = None;
                    active.session.estimated_amount = None;
                    state.notice = Some(Notice::ClaimReverted { hash });
                    return;
                }
                ClaimSettlement::Settled(amount) => {
                    active.session.settled_amount = Some(amount);
                }
                ClaimSettlement::Missing => {}
            }

            if let Some(tx) = active.session.claim.as_mut() {
                TransactionTracker::<W, F>::mark_confirmed(tx);
            }
            info!(%account, %hash, "Claim confirmed");
        }

        // The legacy balance is stale once the claim has settled
        self.resolver.invalidate_balance(deployment.chain_id, &account).await;
        let resolution = match self.resolver.resolve(deployment.chain_id, &account).await {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!(%account, error = %e, "Failed to refetch balance after claim");
                return;
            }
        };

        let mut accounts = self.accounts.write().await;
        if let Some(state) = live_state(&mut accounts, &account, session_id, &cancel) {
            state.apply_resolution(resolution);
        }
    }
}
