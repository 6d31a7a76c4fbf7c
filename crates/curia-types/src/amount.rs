use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

/// Basis points denominator (10_000 = 100%).
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Amount in base units of whatever currency it is paired with.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Self = Self(0);

    pub fn from_base_units(units: u64) -> Self {
        Self(units)
    }

    pub fn to_base_units(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(&self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(&self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(&self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(&self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// `self * numerator / denominator`, rounded down, computed in 128 bits.
    pub fn mul_div(&self, numerator: u64, denominator: u64) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        let wide = self.0 as u128 * numerator as u128 / denominator as u128;
        u64::try_from(wide).ok().map(Self)
    }

    /// Basis-point fraction of this amount, rounded down. Never exceeds `self` for `bps <= 10_000`.
    pub fn bps(&self, bps: u32) -> Self {
        let bps = (bps as u64).min(BPS_DENOMINATOR);
        // bps <= denominator so the result fits
        Self((self.0 as u128 * bps as u128 / BPS_DENOMINATOR as u128) as u64)
    }

    /// Even split into `parts` plus the remainder.
    pub fn split_even(&self, parts: u64) -> (Self, Self) {
        if parts == 0 {
            return (Self::ZERO, *self);
        }
        (Self(self.0 / parts), Self(self.0 % parts))
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, a| acc.saturating_add(a))
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
