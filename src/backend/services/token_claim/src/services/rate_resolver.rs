use num_bigint::BigUint;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::models::account::Account;
use crate::models::call::{ContractCall, ReadMode};
use crate::models::rate::{entitlement, legacy_equivalent, ClaimRate};
use crate::models::token::{u256_to_biguint, AllowanceBasis, ChainId, Deployment, DeploymentRegistry, TokenAmount};
use crate::repositories::traits::ChainReader;
use crate::utils::errors::{ClaimError, Result};

/// Balance, rate and entitlement of one account on a supported chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimQuote {
    pub deployment: Deployment,
    pub balance_v1: TokenAmount,
    /// `None` until the rate has been read successfully
    pub rate: Option<ClaimRate>,
    /// `None` while the rate is unknown; never defaulted to zero
    pub entitlement: Option<TokenAmount>,
}

impl ClaimQuote {
    pub fn has_available_claim(&self) -> bool {
        !self.balance_v1.is_zero()
            && self
                .entitlement
                .as_ref()
                .map_or(false, |amount| !amount.is_zero())
    }

    /// Known to have nothing to claim, as opposed to not knowing yet.
    pub fn no_claim_available(&self) -> bool {
        self.balance_v1.is_zero()
            || self
                .entitlement
                .as_ref()
                .map_or(false, TokenAmount::is_zero)
    }

    /// The amount the claim contract's allowance over the legacy token must
    /// cover, in legacy smallest units.
    pub fn required_allowance(&self) -> Option<BigUint> {
        match self.deployment.allowance_basis {
            AllowanceBasis::LegacyBalance => Some(self.balance_v1.raw().clone()),
            AllowanceBasis::Entitlement => match (&self.entitlement, self.rate) {
                (Some(amount), Some(rate)) => legacy_equivalent(amount.raw(), rate),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No deployment on the active chain
    Unavailable { chain_id: ChainId },
    Resolved(ClaimQuote),
}

impl Resolution {
    pub fn quote(&self) -> Option<&ClaimQuote> {
        match self {
            Resolution::Resolved(quote) => Some(quote),
            Resolution::Unavailable { .. } => None,
        }
    }

    pub fn has_available_claim(&self) -> bool {
        self.quote().map_or(false, ClaimQuote::has_available_claim)
    }
}

/// Reads the legacy balance and claim rate and computes the entitlement.
///
/// The rate is cached per chain and never refreshed on its own. Balances are
/// cached per account until explicitly invalidated.
pub struct RateResolver<R: ChainReader> {
    reader: Arc<R>,
    registry: Arc<DeploymentRegistry>,
    rates: RwLock<HashMap<ChainId, ClaimRate>>,
    balances: RwLock<HashMap<(ChainId, Account), BigUint>>,
}

impl<R: ChainReader> RateResolver<R> {
    pub fn new(reader: Arc<R>, registry: Arc<DeploymentRegistry>) -> Self {
        Self {
            reader,
            registry,
            rates: RwLock::new(HashMap::new()),
            balances: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &DeploymentRegistry {
        &self.registry
    }

    pub async fn resolve(&self, chain_id: ChainId, account: &Account) -> Result<Resolution> {
        let deployment = match self.registry.resolve(chain_id) {
            Some(deployment) => deployment.clone(),
            None => {
                debug!(chain_id, "No claim deployment on chain");
                return Ok(Resolution::Unavailable { chain_id });
            }
        };

        let balance = self.balance(&deployment, account).await?;
        let balance_v1 = deployment.legacy.amount(balance);

        // Zero balance short-circuits; the rate is irrelevant
        if balance_v1.is_zero() {
            return Ok(Resolution::Resolved(ClaimQuote {
                rate: self.cached_rate(chain_id).await,
                entitlement: Some(deployment.successor.amount(BigUint::from(0u32))),
                deployment,
                balance_v1,
            }));
        }

        let rate = self.rate(&deployment).await;
        let entitlement = rate.map(|rate| {
            deployment
                .successor
                .amount(entitlement(balance_v1.raw(), rate))
        });

        Ok(Resolution::Resolved(ClaimQuote {
            deployment,
            balance_v1,
            rate,
            entitlement,
        }))
    }

    /// The cached rate, reading it on first use. A failed read stays `None`
    /// and is retried on the next call.
    pub async fn rate(&self, deployment: &Deployment) -> Option<ClaimRate> {
        if let Some(rate) = self.cached_rate(deployment.chain_id).await {
            return Some(rate);
        }

        let word = match self
            .reader
            .read_contract(deployment.claim_contract, ContractCall::GetClaimRate, ReadMode::NeverReload)
            .await
        {
            Ok(word) => word,
            Err(e) => {
                warn!(chain_id = deployment.chain_id, error = %e, "Failed to read claim rate");
                return None;
            }
        };

        let Some(rate) = ClaimRate::from_word(word) else {
            warn!(chain_id = deployment.chain_id, %word, "Claim rate out of range");
            return None;
        };

        debug!(chain_id = deployment.chain_id, rate = rate.raw(), "Cached claim rate");
        self.rates.write().await.insert(deployment.chain_id, rate);
        Some(rate)
    }

    async fn cached_rate(&self, chain_id: ChainId) -> Option<ClaimRate> {
        self.rates.read().await.get(&chain_id).copied()
    }

    pub async fn balance(&self, deployment: &Deployment, account: &Account) -> Result<BigUint> {
        let key = (deployment.chain_id, *account);
        if let Some(balance) = self.balances.read().await.get(&key) {
            return Ok(balance.clone());
        }

        let word = self
            .reader
            .read_contract(
                deployment.legacy.address,
                ContractCall::BalanceOf { owner: account.address() },
                ReadMode::Live,
            )
            .await
            .map_err(|e| ClaimError::ChainRead(e.to_string()))?;

        let balance = u256_to_biguint(word);
        self.balances.write().await.insert(key, balance.clone());
        Ok(balance)
    }

    /// Drop the cached balance and read it again.
    pub async fn refetch_balance(&self, deployment: &Deployment, account: &Account) -> Result<BigUint> {
        self.invalidate_balance(deployment.chain_id, account).await;
        self.balance(deployment, account).await
    }

    /// Current allowance of the claim contract over the account's legacy tokens. Never cached.
    pub async fn allowance(&self, deployment: &Deployment, account: &Account) -> Result<BigUint> {
        let word = self
            .reader
            .read_contract(
                deployment.legacy.address,
                ContractCall::Allowance {
                    owner: account.address(),
                    spender: deployment.claim_contract,
                },
                ReadMode::Live,
            )
            .await
            .map_err(|e| ClaimError::ChainRead(e.to_string()))?;

        Ok(u256_to_biguint(word))
    }

    pub async fn invalidate_rate(&self, chain_id: ChainId) {
        self.rates.write().await.remove(&chain_id);
    }

    pub async fn invalidate_balance(&self, chain_id: ChainId, account: &Account) {
        self.balances.write().await.remove(&(chain_id, *account));
    }
}
