//! Fixed-point monetary amounts with 6 fractional digits.
//!
//! The ledger's stake token uses a 6-decimal integer scale, so every amount is
//! held as integer base units (`value = units / 1_000_000`). Division always
//! truncates, matching the ledger's own integer arithmetic, and every operation
//! is overflow-checked.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::{ArithmeticError, ValidationError};

/// Number of fractional decimal digits.
pub const DECIMALS: u32 = 6;

/// Base units per whole token.
pub const SCALE: u128 = 1_000_000;

/// A non-negative amount of the stake token.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(u128);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Largest representable amount (used for unlimited approvals).
    pub const MAX: Self = Self(u128::MAX);

    /// Create an amount from raw base units.
    #[must_use]
    pub const fn from_units(units: u128) -> Self {
        Self(units)
    }

    /// Create an amount from whole tokens.
    ///
    /// # Errors
    ///
    /// Returns [`ArithmeticError::Overflow`] if the scaled value does not fit.
    pub fn from_whole(tokens: u128) -> Result<Self, ArithmeticError> {
        tokens
            .checked_mul(SCALE)
            .map(Self)
            .ok_or(ArithmeticError::Overflow)
    }

    /// Raw base units.
    #[must_use]
    pub const fn units(self) -> u128 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Overflow-checked addition.
    ///
    /// # Errors
    ///
    /// Returns [`ArithmeticError::Overflow`] if the sum does not fit.
    pub fn checked_add(self, other: Self) -> Result<Self, ArithmeticError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(ArithmeticError::Overflow)
    }

    /// Subtraction that refuses to go negative.
    ///
    /// # Errors
    ///
    /// Returns [`ArithmeticError::Underflow`] if `other > self`.
    pub fn checked_sub(self, other: Self) -> Result<Self, ArithmeticError> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(ArithmeticError::Underflow)
    }

    /// Proportional share: `self * numerator / denominator`, truncated.
    ///
    /// # Errors
    ///
    /// Returns [`ArithmeticError::DivisionByZero`] for a zero denominator and
    /// [`ArithmeticError::Overflow`] if the intermediate product does not fit.
    pub fn mul_by_ratio(self, numerator: u128, denominator: u128) -> Result<Self, ArithmeticError> {
        if denominator == 0 {
            return Err(ArithmeticError::DivisionByZero);
        }
        let product = self
            .0
            .checked_mul(numerator)
            .ok_or(ArithmeticError::Overflow)?;
        Ok(Self(product / denominator))
    }

    /// Render with `precision` fractional digits, rounding half up.
    ///
    /// Precision above 6 is clamped to 6.
    #[must_use]
    pub fn to_display(self, precision: u32) -> String {
        let precision = precision.min(DECIMALS);
        let divisor = 10u128.pow(DECIMALS - precision);
        let half = divisor / 2;
        // Saturating so that the extreme MAX value still renders.
        let scaled = if divisor == 1 {
            self.0
        } else {
            self.0.saturating_add(half) / divisor
        };
        let unit = 10u128.pow(precision);
        let whole = scaled / unit;
        if precision == 0 {
            return whole.to_string();
        }
        let frac = scaled % unit;
        format!("{whole}.{frac:0width$}", width = precision as usize)
    }

    /// Convert to a [`Decimal`] with scale 6.
    ///
    /// # Errors
    ///
    /// Returns [`ArithmeticError::Overflow`] if the amount exceeds the 96-bit
    /// mantissa of [`Decimal`].
    pub fn to_decimal(self) -> Result<Decimal, ArithmeticError> {
        let units = i128::try_from(self.0).map_err(|_| ArithmeticError::Overflow)?;
        Decimal::try_from_i128_with_scale(units, DECIMALS).map_err(|_| ArithmeticError::Overflow)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = ValidationError;

    /// Convert a decimal amount, rejecting negatives and sub-unit precision.
    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        let invalid = |reason| ValidationError::InvalidMoney {
            input: value.to_string(),
            reason,
        };
        if value.is_sign_negative() && !value.is_zero() {
            return Err(invalid("negative amount"));
        }
        if value.scale() > DECIMALS && value.normalize().scale() > DECIMALS {
            return Err(invalid("more than 6 fractional digits"));
        }
        let mut scaled = value.normalize();
        scaled.rescale(DECIMALS);
        let units = u128::try_from(scaled.mantissa()).map_err(|_| invalid("out of range"))?;
        Ok(Self(units))
    }
}

impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = |reason| ValidationError::InvalidMoney {
            input: s.to_string(),
            reason,
        };
        if trimmed.is_empty() {
            return Err(invalid("empty"));
        }
        let (whole, frac) = trimmed.split_once('.').unwrap_or((trimmed, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid("empty"));
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid("not a non-negative decimal number"));
        }
        if frac.len() > DECIMALS as usize {
            return Err(invalid("more than 6 fractional digits"));
        }

        let whole_units = if whole.is_empty() {
            0
        } else {
            whole.parse::<u128>().map_err(|_| invalid("out of range"))?
        };
        let frac_units = if frac.is_empty() {
            0
        } else {
            let padded = format!("{frac:0<width$}", width = DECIMALS as usize);
            padded.parse::<u128>().map_err(|_| invalid("out of range"))?
        };

        whole_units
            .checked_mul(SCALE)
            .and_then(|u| u.checked_add(frac_units))
            .map(Self)
            .ok_or_else(|| invalid("out of range"))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SCALE;
        let frac = self.0 % SCALE;
        write!(f, "{whole}.{frac:06}")
    }
}
