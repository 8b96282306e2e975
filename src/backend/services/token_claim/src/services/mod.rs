pub mod allowance;
pub mod claim_orchestrator;
pub mod rate_resolver;
pub mod transaction_tracker;
