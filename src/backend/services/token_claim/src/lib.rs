//! # Token Claim
//!
//! Orchestration core for converting a legacy token balance into its
//! successor token through a two-phase approve-then-claim flow.
//!
//! ## Overview
//!
//! The crate is layered bottom-up:
//!
//! - [`services::rate_resolver`] reads the legacy balance and claim rate and
//!   computes the entitlement
//! - [`services::allowance`] derives the approval status from the on-chain
//!   allowance and the optimistic local pending flag
//! - [`services::transaction_tracker`] submits transactions, polls their
//!   confirmation and decodes the settled amount from the claim receipt
//! - [`services::claim_orchestrator`] sequences the above and exposes the
//!   [`api::view::ClaimView`] a presentation layer renders
//!
//! Chain access goes through the collaborator traits in
//! [`repositories::traits`]. No state is persisted.

pub mod api;
pub mod config;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;

pub use api::view::{ClaimBadge, ClaimView, Notice};
pub use config::ClaimConfig;
pub use models::account::{Account, ClaimContext};
pub use services::claim_orchestrator::ClaimOrchestrator;
pub use utils::errors::{ClaimError, ProviderError, Result};
