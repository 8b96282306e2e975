use alloy_primitives::{Address, U256};
use anyhow::{bail, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use token_claim::{
    config::{DeploymentConfig, TokenConfig},
    models::{session::ApprovalStatus, token::ChainId},
    repositories::memory::{InMemoryChain, WalletResponse},
    ClaimConfig, ClaimContext, ClaimOrchestrator, ClaimView,
};

type SimulatedOrchestrator = ClaimOrchestrator<InMemoryChain, InMemoryChain, InMemoryChain>;

/// Simulated wallet account.
const HOLDER: Address = Address::repeat_byte(0x5a);

/// Confirmation polls before the simulator gives up on a state change.
const MAX_WAIT_POLLS: u32 = 200;

#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub chain_id: ChainId,
    pub balance: U256,
    pub rate: u64,
    pub poll_ms: u64,
    pub emit_successor_logs: bool,
    pub reject: bool,
}

pub struct ClaimCommands;

impl ClaimCommands {
    /// Mainnet-shaped deployment used when no config file is given.
    pub fn sample_config() -> ClaimConfig {
        ClaimConfig {
            poll_interval_ms: 4_000,
            deployments: vec![DeploymentConfig {
                chain_id: 1,
                claim_contract: "0x3333333333333333333333333333333333333333".to_string(),
                approval_required: true,
                allowance_basis: Default::default(),
                legacy: TokenConfig {
                    address: "0x1111111111111111111111111111111111111111".to_string(),
                    decimals: 9,
                    symbol: "MISHKA".to_string(),
                },
                successor: TokenConfig {
                    address: "0x2222222222222222222222222222222222222222".to_string(),
                    decimals: 9,
                    symbol: "MISHKA2".to_string(),
                },
            }],
        }
    }

    pub fn init_config(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            bail!("{} already exists, pass --force to overwrite", path.display());
        }
        Self::sample_config().save_to(path)?;
        Ok(())
    }

    /// Drive connect, approve and claim against a fresh in-memory chain,
    /// printing every view as JSON.
    pub async fn simulate(mut config: ClaimConfig, options: SimulateOptions) -> Result<()> {
        config.poll_interval_ms = options.poll_ms;
        let registry = config.registry()?;

        let chain = Arc::new(InMemoryChain::new());
        for chain_id in registry.chain_ids() {
            if let Some(deployment) = registry.resolve(chain_id) {
                chain
                    .deploy_claim_contract(
                        deployment.claim_contract,
                        deployment.legacy.address,
                        deployment.successor.address,
                        U256::from(options.rate),
                        deployment.approval_required,
                    )
                    .await;
                chain
                    .set_balance(deployment.legacy.address, HOLDER, options.balance)
                    .await;
            }
        }
        chain.connect_account(HOLDER).await;
        chain.set_emit_successor_logs(options.emit_successor_logs).await;

        let orchestrator = ClaimOrchestrator::from_config(
            &config,
            Arc::clone(&chain),
            Arc::clone(&chain),
            Arc::clone(&chain),
        )?;
        let ctx = orchestrator.connect(options.chain_id).await?;

        if options.reject {
            chain.set_wallet_response(WalletResponse::Reject).await;
        }

        let mut view = orchestrator.refresh(&ctx).await?;
        print_view("refresh", &view)?;

        if view.can_approve {
            view = orchestrator.approve(&ctx).await?;
            print_view("approve", &view)?;

            if view.approval_hash.is_some() {
                chain.mine_all().await?;
                view = wait_until(&orchestrator, &ctx, config.poll_interval(), |v| {
                    v.approval_status == ApprovalStatus::Approved
                })
                .await;
                print_view("approval confirmed", &view)?;
            }
        }

        if view.can_claim {
            view = orchestrator.claim(&ctx).await?;
            print_view("claim", &view)?;

            if view.claim_hash.is_some() {
                chain.mine_all().await?;
                view = wait_until(&orchestrator, &ctx, config.poll_interval(), |v| {
                    v.claim_confirmed || v.notice.is_some()
                })
                .await;
                print_view("claim settled", &view)?;
            }
        }

        orchestrator.shutdown();
        info!(phase = ?view.phase, "Simulation finished");
        Ok(())
    }
}

async fn wait_until<P>(
    orchestrator: &SimulatedOrchestrator,
    ctx: &ClaimContext,
    poll_interval: Duration,
    done: P,
) -> ClaimView
where
    P: Fn(&ClaimView) -> bool,
{
    for _ in 0..MAX_WAIT_POLLS {
        let view = orchestrator.view(ctx).await;
        if done(&view) {
            return view;
        }
        tokio::time::sleep(poll_interval).await;
    }
    warn!("Gave up waiting for confirmation");
    orchestrator.view(ctx).await
}

fn print_view(step: &str, view: &ClaimView) -> Result<()> {
    println!("# {}", step);
    println!("{}", serde_json::to_string_pretty(view)?);
    Ok(())
}
