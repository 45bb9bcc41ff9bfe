//! User position ledger.
//!
//! Maintains the local record of what each user has staked per market.
//! It is written only by the orchestrators' terminal success transitions and
//! by an explicit sync from the ledger, never speculatively.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::domain::{ArithmeticError, MarketId, Money, StakeOption, UserId, UserPosition};

/// Positions keyed by `(market, user)`.
#[derive(Debug, Default)]
pub struct PositionBook {
    positions: RwLock<HashMap<(MarketId, UserId), UserPosition>>,
}

impl PositionBook {
    /// Create an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current position, zero if none is recorded.
    #[must_use]
    pub fn get(&self, market_id: MarketId, user: &UserId) -> UserPosition {
        self.positions
            .read()
            .get(&(market_id, user.clone()))
            .copied()
            .unwrap_or_default()
    }

    /// Add a confirmed stake.
    ///
    /// # Errors
    ///
    /// Returns [`ArithmeticError::Overflow`] and leaves the position unchanged
    /// if the stake does not fit.
    pub fn credit(
        &self,
        market_id: MarketId,
        user: &UserId,
        option: StakeOption,
        amount: Money,
    ) -> Result<UserPosition, ArithmeticError> {
        let mut positions = self.positions.write();
        let entry = positions.entry((market_id, user.clone())).or_default();
        *entry = entry.credited(option, amount)?;
        debug!(market_id = %market_id, user = %user, option = %option, amount = %amount, "Position credited");
        Ok(*entry)
    }

    /// Forget a position after a confirmed claim.
    pub fn clear(&self, market_id: MarketId, user: &UserId) {
        self.positions.write().remove(&(market_id, user.clone()));
    }

    /// Overwrite with the ledger's view.
    pub fn replace(&self, market_id: MarketId, user: &UserId, position: UserPosition) {
        let mut positions = self.positions.write();
        if position.is_empty() {
            positions.remove(&(market_id, user.clone()));
        } else {
            positions.insert((market_id, user.clone()), position);
        }
    }

    /// Markets where `user` holds a non-empty position.
    #[must_use]
    pub fn markets_for(&self, user: &UserId) -> Vec<MarketId> {
        let mut markets: Vec<_> = self
            .positions
            .read()
            .iter()
            .filter(|((_, u), p)| u == user && !p.is_empty())
            .map(|((m, _), _)| *m)
            .collect();
        markets.sort_unstable();
        markets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserId {
        UserId::new("0xa11ce")
    }

    #[test]
    fn unknown_position_is_zero() {
        let book = PositionBook::new();
        assert!(book.get(MarketId::new(0), &alice()).is_empty());
    }

    #[test]
    fn credits_accumulate_per_market() {
        let book = PositionBook::new();
        let m0 = MarketId::new(0);
        book.credit(m0, &alice(), StakeOption::A, Money::from_units(10)).unwrap();
        book.credit(m0, &alice(), StakeOption::A, Money::from_units(5)).unwrap();
        book.credit(MarketId::new(1), &alice(), StakeOption::B, Money::from_units(1)).unwrap();

        assert_eq!(book.get(m0, &alice()).stake_a(), Money::from_units(15));
        assert_eq!(book.markets_for(&alice()), vec![MarketId::new(0), MarketId::new(1)]);
    }

    #[test]
    fn failed_credit_leaves_position_unchanged() {
        let book = PositionBook::new();
        let m0 = MarketId::new(0);
        book.replace(m0, &alice(), UserPosition::new(Money::MAX, Money::ZERO));
        assert!(book.credit(m0, &alice(), StakeOption::A, Money::from_units(1)).is_err());
        assert_eq!(book.get(m0, &alice()).stake_a(), Money::MAX);
    }

    #[test]
    fn clear_resets_to_zero() {
        let book = PositionBook::new();
        let m0 = MarketId::new(0);
        book.credit(m0, &alice(), StakeOption::B, Money::from_units(3)).unwrap();
        book.clear(m0, &alice());
        assert!(book.get(m0, &alice()).is_empty());
        assert!(book.markets_for(&alice()).is_empty());
    }
}
