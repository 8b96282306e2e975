#![allow(dead_code)]

use alloy_primitives::{Address, U256};
use std::sync::Arc;
use std::time::Duration;

use token_claim::{
    models::token::{AllowanceBasis, ChainId, Deployment, DeploymentRegistry, TokenRef},
    repositories::memory::InMemoryChain,
    ClaimContext, ClaimOrchestrator, ClaimView,
};

pub const CHAIN: ChainId = 1;
pub const LEGACY: Address = Address::repeat_byte(0x11);
pub const SUCCESSOR: Address = Address::repeat_byte(0x22);
pub const CLAIM: Address = Address::repeat_byte(0x33);
pub const HOLDER: Address = Address::repeat_byte(0x44);

pub type MemoryOrchestrator = ClaimOrchestrator<InMemoryChain, InMemoryChain, InMemoryChain>;

pub struct Harness {
    pub chain: Arc<InMemoryChain>,
    pub orchestrator: MemoryOrchestrator,
    pub ctx: ClaimContext,
}

pub fn deployment(approval_required: bool) -> Deployment {
    Deployment {
        chain_id: CHAIN,
        legacy: TokenRef {
            chain_id: CHAIN,
            address: LEGACY,
            decimals: 0,
            symbol: "MISHKA".to_string(),
        },
        successor: TokenRef {
            chain_id: CHAIN,
            address: SUCCESSOR,
            decimals: 0,
            symbol: "MISHKA2".to_string(),
        },
        claim_contract: CLAIM,
        approval_required,
        allowance_basis: AllowanceBasis::LegacyBalance,
    }
}

pub async fn setup(balance: u64, rate: u64, approval_required: bool) -> Harness {
    setup_with(balance, rate, deployment(approval_required), approval_required).await
}

/// `contract_requires_allowance` may disagree with the deployment to force reverts.
pub async fn setup_with(
    balance: u64,
    rate: u64,
    deployment: Deployment,
    contract_requires_allowance: bool,
) -> Harness {
    let chain = Arc::new(InMemoryChain::new());
    chain
        .deploy_claim_contract(CLAIM, LEGACY, SUCCESSOR, U256::from(rate), contract_requires_allowance)
        .await;
    chain.set_balance(LEGACY, HOLDER, U256::from(balance)).await;
    chain.connect_account(HOLDER).await;

    let orchestrator = ClaimOrchestrator::new(
        Arc::clone(&chain),
        Arc::clone(&chain),
        Arc::clone(&chain),
        DeploymentRegistry::new(vec![deployment]),
        Duration::from_millis(5),
    );
    let ctx = ClaimContext::new(CHAIN, HOLDER.to_checksum(None));

    Harness {
        chain,
        orchestrator,
        ctx,
    }
}

/// Poll the cached view until `pred` holds.
pub async fn wait_for_view<P>(harness: &Harness, pred: P) -> ClaimView
where
    P: Fn(&ClaimView) -> bool,
{
    for _ in 0..400 {
        let view = harness.orchestrator.view(&harness.ctx).await;
        if pred(&view) {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "view never reached expected state: {:?}",
        harness.orchestrator.view(&harness.ctx).await
    );
}

/// Let spawned watchers run for a while.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(60)).await;
}
