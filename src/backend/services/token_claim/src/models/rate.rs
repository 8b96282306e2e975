use alloy_primitives::U256;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

// Rate basis: 1000 is parity
pub const RATE_BASIS: u64 = 1_000;
// Legacy to successor supply rebase (1 trillion down to 1 billion)
pub const REBASE_DIVISOR: u64 = 1_000_000;

/// Contract-supplied conversion rate, scaled by [`RATE_BASIS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimRate(u64);

impl ClaimRate {
    pub const PARITY: ClaimRate = ClaimRate(RATE_BASIS);

    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// `None` if the contract word does not fit the rate domain.
    pub fn from_word(word: U256) -> Option<Self> {
        u64::try_from(word).ok().map(Self)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Bonus over parity in percent, e.g. `5.0` for a rate of 1050.
    /// Display only; never feeds amount arithmetic.
    pub fn bonus_percent(&self) -> f64 {
        (self.0 as f64 - RATE_BASIS as f64) / 10.0
    }
}

/// `floor(balance / 1_000_000) * rate`, exactly, in successor smallest units.
pub fn entitlement(balance_v1: &BigUint, rate: ClaimRate) -> BigUint {
    (balance_v1 / BigUint::from(REBASE_DIVISOR)) * BigUint::from(rate.raw())
}

/// Legacy smallest units backing `amount` successor units,
/// `ceil(amount * 1_000_000 / rate)`. `None` for a zero rate.
pub fn legacy_equivalent(amount: &BigUint, rate: ClaimRate) -> Option<BigUint> {
    if rate.raw() == 0 {
        return None;
    }
    let rate = BigUint::from(rate.raw());
    let scaled = amount * BigUint::from(REBASE_DIVISOR);
    Some((scaled + &rate - 1u32) / rate)
}
