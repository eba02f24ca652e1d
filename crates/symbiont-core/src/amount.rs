//! USDC amount type with fixed-point precision.
//!
//! Prices, rewards, stakes and escrowed payments are all USDC with 6 decimal
//! places. Amounts are stored as micro-USDC so the ledger path never touches
//! floating point.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::CoreError;

/// Number of decimal places for USDC precision.
pub const DECIMALS: u32 = 6;

/// One whole USDC in micro units.
pub const MICROS_PER_USDC: u64 = 1_000_000;

/// A USDC amount with fixed-point precision (6 decimals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u64);

impl Amount {
    /// Zero amount constant.
    pub const ZERO: Self = Self(0);

    /// Maximum possible amount.
    pub const MAX: Self = Self(u64::MAX);

    /// Creates an Amount from micro-USDC units.
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Creates an Amount from whole USDC units (saturating).
    #[must_use]
    pub const fn from_usdc(usdc: u64) -> Self {
        Self(usdc.saturating_mul(MICROS_PER_USDC))
    }

    /// Returns the amount in micro-USDC units.
    #[must_use]
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Returns the amount in whole USDC as a float, for scoring only.
    #[must_use]
    pub fn as_usdc_f64(self) -> f64 {
        self.0 as f64 / MICROS_PER_USDC as f64
    }

    /// Checked addition. Returns `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Checked subtraction. Returns `None` on underflow.
    #[must_use]
    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        match self.0.checked_sub(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Saturating addition.
    #[must_use]
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction.
    #[must_use]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// Returns true if this amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / MICROS_PER_USDC;
        let frac = self.0 % MICROS_PER_USDC;
        write!(f, "{whole}.{frac:06} USDC")
    }
}

impl FromStr for Amount {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('-') {
            return Err(CoreError::InvalidAmount("negative values not allowed".into()));
        }
        if let Some(bad) = s.chars().find(|c| !c.is_ascii_digit() && *c != '.') {
            return Err(CoreError::InvalidAmount(format!("unexpected character {bad:?}: {s}")));
        }

        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [whole] => {
                let whole: u64 = whole
                    .parse()
                    .map_err(|_| CoreError::InvalidAmount(format!("invalid number: {s}")))?;
                whole
                    .checked_mul(MICROS_PER_USDC)
                    .map(Amount)
                    .ok_or_else(|| CoreError::InvalidAmount("overflow".into()))
            }
            [whole, frac_str] => {
                let whole: u64 = if whole.is_empty() {
                    0
                } else {
                    whole
                        .parse()
                        .map_err(|_| CoreError::InvalidAmount(format!("invalid whole part: {s}")))?
                };

                if frac_str.is_empty() || frac_str.len() > DECIMALS as usize {
                    return Err(CoreError::InvalidAmount(format!(
                        "fractional part must have 1 to {DECIMALS} digits: {s}"
                    )));
                }

                let padded = format!("{frac_str:0<6}");
                let frac: u64 = padded
                    .parse()
                    .map_err(|_| CoreError::InvalidAmount(format!("invalid fractional part: {s}")))?;

                whole
                    .checked_mul(MICROS_PER_USDC)
                    .and_then(|w| w.checked_add(frac))
                    .map(Amount)
                    .ok_or_else(|| CoreError::InvalidAmount("overflow".into()))
            }
            _ => Err(CoreError::InvalidAmount(format!("invalid format: {s}"))),
        }
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let whole = self.0 / MICROS_PER_USDC;
        let frac = self.0 % MICROS_PER_USDC;

        let s = if frac == 0 {
            format!("{whole}")
        } else {
            let frac_str = format!("{frac:06}");
            format!("{whole}.{}", frac_str.trim_end_matches('0'))
        };

        serializer.serialize_str(&s)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
