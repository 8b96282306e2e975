use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::{fs, path::Path, path::PathBuf, time::Duration};

use crate::models::account::Account;
use crate::models::token::{AllowanceBasis, ChainId, Deployment, DeploymentRegistry, TokenRef};
use crate::utils::errors::{ClaimError, Result};

/// Configuration for the claim flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimConfig {
    /// Confirmation polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Claim deployments, one per chain
    #[serde(default)]
    pub deployments: Vec<DeploymentConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub chain_id: ChainId,
    pub claim_contract: String,
    #[serde(default = "default_approval_required")]
    pub approval_required: bool,
    #[serde(default)]
    pub allowance_basis: AllowanceBasis,
    pub legacy: TokenConfig,
    pub successor: TokenConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub address: String,
    pub decimals: u8,
    pub symbol: String,
}

fn default_approval_required() -> bool {
    true
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 4_000,
            deployments: Vec::new(),
        }
    }
}

impl ClaimConfig {
    /// `<config dir>/token-claim/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_default()
            .join("token-claim")
            .join("config.toml")
    }

    /// Load from the default location, writing defaults if the file is missing.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if !path.exists() {
            let config = Self::default();
            config.save_to(&path)?;
            return Ok(config);
        }
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ClaimError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).map_err(|e| ClaimError::Config(e.to_string()))?;
        config.registry()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| ClaimError::Config(e.to_string()))?;
        }
        let contents = self.to_toml()?;
        fs::write(path, contents).map_err(|e| ClaimError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ClaimError::Config(e.to_string()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validate addresses and build the deployment registry.
    pub fn registry(&self) -> Result<DeploymentRegistry> {
        if self.poll_interval_ms == 0 {
            return Err(ClaimError::Config("poll_interval_ms must be positive".to_string()));
        }

        let mut seen = HashSet::new();
        let mut deployments = Vec::with_capacity(self.deployments.len());

        for entry in &self.deployments {
            if !seen.insert(entry.chain_id) {
                return Err(ClaimError::Config(format!(
                    "Duplicate deployment for chain {}",
                    entry.chain_id
                )));
            }

            deployments.push(Deployment {
                chain_id: entry.chain_id,
                legacy: entry.legacy.token_ref(entry.chain_id)?,
                successor: entry.successor.token_ref(entry.chain_id)?,
                claim_contract: parse_address(&entry.claim_contract)?,
                approval_required: entry.approval_required,
                allowance_basis: entry.allowance_basis,
            });
        }

        Ok(DeploymentRegistry::new(deployments))
    }
}

impl TokenConfig {
    fn token_ref(&self, chain_id: ChainId) -> Result<TokenRef> {
        Ok(TokenRef {
            chain_id,
            address: parse_address(&self.address)?,
            decimals: self.decimals,
            symbol: self.symbol.clone(),
        })
    }
}

fn parse_address(raw: &str) -> Result<alloy_primitives::Address> {
    Account::parse(raw)
        .map(|account| account.address())
        .map_err(|e| ClaimError::Config(e.to_string()))
}
