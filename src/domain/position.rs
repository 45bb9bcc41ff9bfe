//! A user's stake in one market.

use serde::{Deserialize, Serialize};

use super::error::ArithmeticError;
use super::market::StakeOption;
use super::money::Money;

/// Stakes a user holds on each option of one market.
///
/// Only a confirmed stake increases a side; a confirmed claim clears both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPosition {
    stake_a: Money,
    stake_b: Money,
}

impl UserPosition {
    #[must_use]
    pub const fn new(stake_a: Money, stake_b: Money) -> Self {
        Self { stake_a, stake_b }
    }

    #[must_use]
    pub const fn stake_a(&self) -> Money {
        self.stake_a
    }

    #[must_use]
    pub const fn stake_b(&self) -> Money {
        self.stake_b
    }

    /// Stake on the given option.
    #[must_use]
    pub const fn stake(&self, option: StakeOption) -> Money {
        match option {
            StakeOption::A => self.stake_a,
            StakeOption::B => self.stake_b,
        }
    }

    /// True if nothing is staked on either side.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.stake_a.is_zero() && self.stake_b.is_zero()
    }

    /// Position with `amount` added to `option`.
    ///
    /// # Errors
    ///
    /// Returns [`ArithmeticError::Overflow`] if the stake does not fit.
    pub fn credited(self, option: StakeOption, amount: Money) -> Result<Self, ArithmeticError> {
        let mut next = self;
        match option {
            StakeOption::A => next.stake_a = self.stake_a.checked_add(amount)?,
            StakeOption::B => next.stake_b = self.stake_b.checked_add(amount)?,
        }
        Ok(next)
    }
}
