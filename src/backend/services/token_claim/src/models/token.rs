use alloy_primitives::{Address, U256};
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{ser::SerializeStruct, Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

pub type ChainId = u64;

/// A token contract deployed on a specific chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRef {
    pub chain_id: ChainId,
    pub address: Address,
    pub decimals: u8,
    pub symbol: String,
}

impl TokenRef {
    pub fn amount(&self, raw: BigUint) -> TokenAmount {
        TokenAmount::new(raw, self.decimals)
    }
}

/// Which amount the claim contract's allowance must cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowanceBasis {
    /// The full legacy balance, in legacy smallest units
    LegacyBalance,
    /// Only the legacy amount backing the entitlement, i.e. the balance
    /// rounded down to whole rebase steps. Still in legacy smallest units.
    Entitlement,
}

impl Default for AllowanceBasis {
    fn default() -> Self {
        AllowanceBasis::LegacyBalance
    }
}

/// Everything needed to run a claim on one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub chain_id: ChainId,
    pub legacy: TokenRef,
    pub successor: TokenRef,
    pub claim_contract: Address,
    /// Whether the claim contract pulls legacy tokens through an allowance
    pub approval_required: bool,
    pub allowance_basis: AllowanceBasis,
}

/// Deployments keyed by chain id. A chain without an entry has no claim.
#[derive(Debug, Clone, Default)]
pub struct DeploymentRegistry {
    deployments: HashMap<ChainId, Deployment>,
}

impl DeploymentRegistry {
    pub fn new(deployments: impl IntoIterator<Item = Deployment>) -> Self {
        Self {
            deployments: deployments
                .into_iter()
                .map(|d| (d.chain_id, d))
                .collect(),
        }
    }

    pub fn resolve(&self, chain_id: ChainId) -> Option<&Deployment> {
        self.deployments.get(&chain_id)
    }

    pub fn chain_ids(&self) -> impl Iterator<Item = ChainId> + '_ {
        self.deployments.keys().copied()
    }
}

/// An integer amount in a token's smallest unit, tagged with its decimals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAmount {
    raw: BigUint,
    decimals: u8,
}

impl TokenAmount {
    pub fn new(raw: BigUint, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    pub fn raw(&self) -> &BigUint {
        &self.raw
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }

    /// Whole units, truncated toward zero.
    pub fn whole(&self) -> BigUint {
        &self.raw / BigUint::from(10u32).pow(u32::from(self.decimals))
    }
}

/// Whole units with `,` group separators, e.g. `1,050`.
impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.whole().to_str_radix(10);
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }
        f.write_str(&grouped)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TokenAmount", 3)?;
        state.serialize_field("raw", &self.raw.to_str_radix(10))?;
        state.serialize_field("decimals", &self.decimals)?;
        state.serialize_field("formatted", &self.to_string())?;
        state.end()
    }
}

pub fn u256_to_biguint(value: U256) -> BigUint {
    BigUint::from_bytes_be(&value.to_be_bytes::<32>())
}

/// `None` when the amount does not fit in a 256-bit word.
pub fn biguint_to_u256(value: &BigUint) -> Option<U256> {
    U256::try_from_be_slice(&value.to_bytes_be())
}
