use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::models::token::ChainId;
use crate::utils::errors::{ClaimError, Result};

/// A well-formed chain address; the identity key for all per-user state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Account(pub Address);

impl Account {
    /// Parse a `0x`-prefixed hex address.
    ///
    /// All-lowercase and all-uppercase forms are accepted as is. Mixed case
    /// must carry a valid EIP-55 checksum.
    pub fn parse(raw: &str) -> Result<Self> {
        let malformed = || ClaimError::MalformedAddress(raw.to_string());

        let hex = raw.strip_prefix("0x").ok_or_else(malformed)?;
        if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(malformed());
        }

        let has_lower = hex.bytes().any(|b| b.is_ascii_lowercase());
        let has_upper = hex.bytes().any(|b| b.is_ascii_uppercase());

        let address = if has_lower && has_upper {
            Address::parse_checksummed(raw, None).map_err(|_| malformed())?
        } else {
            Address::from_str(raw).map_err(|_| malformed())?
        };

        Ok(Self(address))
    }

    pub fn address(&self) -> Address {
        self.0
    }
}

impl From<Address> for Account {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

impl FromStr for Account {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_checksum(None))
    }
}

/// Active wallet and chain, passed explicitly to every orchestrator call.
///
/// The account is kept in its raw resolved form so that a malformed target
/// disables submission instead of failing earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimContext {
    pub chain_id: ChainId,
    pub account: Option<String>,
}

impl ClaimContext {
    pub fn new(chain_id: ChainId, account: impl Into<String>) -> Self {
        Self {
            chain_id,
            account: Some(account.into()),
        }
    }

    pub fn disconnected(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            account: None,
        }
    }

    /// The parsed target account, if one is connected.
    pub fn target(&self) -> Option<Result<Account>> {
        self.account.as_deref().map(Account::parse)
    }
}
