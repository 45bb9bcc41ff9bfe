//! Pari-mutuel odds and payout calculations.
//!
//! All functions are pure. Division by zero is never reached: every divisor
//! is checked first and the defined zero or breakeven result is returned
//! instead. Settlement arithmetic reproduces the ledger's order of operations
//! so a locally displayed payout equals the collectible amount to the unit.

use serde::Serialize;

use super::error::{ArithmeticError, ValidationError};
use super::market::{MarketSnapshot, StakeOption};
use super::money::Money;
use super::position::UserPosition;

/// Fixed-point scale of the ledger's reward ratio (1e18).
pub const REWARD_SCALE: u128 = 1_000_000_000_000_000_000;

/// Precision factor of the pre-resolution share estimate.
pub const SHARE_PRECISION: u128 = 1_000_000;

/// Basis points in 100%.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Platform fee charged on gross winnings (2%).
pub const DEFAULT_FEE_BPS: u32 = 200;

/// Error raised by payout calculations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayoutError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),
}

/// Share of the pool on each option, in truncated basis points.
///
/// Both sides are computed independently from the totals, so under
/// truncation `bps_a + bps_b` may be one short of 10000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Odds {
    bps_a: u32,
    bps_b: u32,
}

impl Odds {
    /// Even odds, used when nothing has been staked yet.
    pub const EVEN: Self = Self {
        bps_a: 5_000,
        bps_b: 5_000,
    };

    #[must_use]
    pub const fn bps_a(self) -> u32 {
        self.bps_a
    }

    #[must_use]
    pub const fn bps_b(self) -> u32 {
        self.bps_b
    }

    /// Percentage on option A with two truncated decimals.
    #[must_use]
    pub fn pct_a(self) -> f64 {
        f64::from(self.bps_a) / 100.0
    }

    /// Percentage on option B with two truncated decimals.
    #[must_use]
    pub fn pct_b(self) -> f64 {
        f64::from(self.bps_b) / 100.0
    }

    /// Percentage of the given option.
    #[must_use]
    pub fn pct(self, option: StakeOption) -> f64 {
        match option {
            StakeOption::A => self.pct_a(),
            StakeOption::B => self.pct_b(),
        }
    }
}

/// Settlement of a winning stake, net of the platform fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Settlement {
    /// Stake plus share of the losing pool.
    pub gross: Money,
    /// Platform fee taken from `gross`.
    pub fee: Money,
    /// Amount actually paid out.
    pub net: Money,
}

impl Settlement {
    const NOTHING: Self = Self {
        gross: Money::ZERO,
        fee: Money::ZERO,
        net: Money::ZERO,
    };
}

/// `part / whole` in truncated basis points; `whole` must be non-zero.
fn ratio_bps(part: u128, whole: u128) -> u32 {
    let bps = match part.checked_mul(u128::from(BPS_DENOMINATOR)) {
        Some(scaled) => scaled / whole,
        // Only reachable near u128::MAX, where dropping the low digits of the
        // divisor loses nothing visible at basis-point resolution.
        None => part / (whole / u128::from(BPS_DENOMINATOR)).max(1),
    };
    u32::try_from(bps.min(u128::from(BPS_DENOMINATOR))).unwrap_or(BPS_DENOMINATOR)
}

/// Current odds of a market, 50/50 when the pool is empty.
#[must_use]
pub fn odds(snapshot: &MarketSnapshot) -> Odds {
    let a = snapshot.total_stake_a().units();
    let b = snapshot.total_stake_b().units();
    let Some(total) = a.checked_add(b).filter(|t| *t > 0) else {
        if a == 0 && b == 0 {
            return Odds::EVEN;
        }
        // Sum overflowed u128: halve both sides, the ratio is unchanged.
        let (a, b) = (a / 2, b / 2);
        let total = a + b;
        return Odds {
            bps_a: ratio_bps(a, total),
            bps_b: ratio_bps(b, total),
        };
    };
    Odds {
        bps_a: ratio_bps(a, total),
        bps_b: ratio_bps(b, total),
    }
}

/// Estimated payout of staking `stake` on `chosen`, if `chosen` wins.
///
/// Uses the current totals as a proxy for the final ones:
/// `stake * (opposite + chosen) / chosen`. With nothing on the chosen side
/// yet the estimate is breakeven.
///
/// # Errors
///
/// Returns [`ArithmeticError::Overflow`] if the product does not fit.
pub fn projected_payout(
    stake: Money,
    chosen: StakeOption,
    snapshot: &MarketSnapshot,
) -> Result<Money, ArithmeticError> {
    let chosen_total = snapshot.total_stake(chosen);
    if chosen_total.is_zero() {
        return Ok(stake);
    }
    let pool = chosen_total.checked_add(snapshot.total_stake(chosen.opposite()))?;
    stake.mul_by_ratio(pool.units(), chosen_total.units())
}

/// Full settlement breakdown for a stake on the winning side.
///
/// Mirrors the ledger exactly:
///
/// ```text
/// reward_ratio = losing * 1e18 / winning
/// gross        = stake + stake * reward_ratio / 1e18
/// fee          = gross * fee_bps / 10000
/// net          = gross - fee
/// ```
///
/// An empty winning pool pays nothing.
///
/// The intermediates stay in `u128`: `losing * 1e18` fits only while the
/// losing pool is below about 3.4e20 base units (3.4e14 tokens at six
/// decimals), and `stake * reward_ratio` bounds the stake the same way.
/// Larger pools are reported as overflow rather than settled.
///
/// # Errors
///
/// - [`ValidationError::InvalidFee`] if `fee_bps > 10000`
/// - [`ValidationError::StakeExceedsPool`] if `user_stake > total_winning`
/// - [`ValidationError::NoWinnersToPay`] if the winning pool is empty but the
///   user stake is not
/// - [`ArithmeticError::Overflow`] on intermediate overflow
pub fn settle(
    user_stake: Money,
    total_winning: Money,
    total_losing: Money,
    fee_bps: u32,
) -> Result<Settlement, PayoutError> {
    if fee_bps > BPS_DENOMINATOR {
        return Err(ValidationError::InvalidFee { fee_bps }.into());
    }
    if total_winning.is_zero() {
        if user_stake.is_zero() {
            return Ok(Settlement::NOTHING);
        }
        return Err(ValidationError::NoWinnersToPay.into());
    }
    if user_stake > total_winning {
        return Err(ValidationError::StakeExceedsPool {
            user_stake,
            pool: total_winning,
        }
        .into());
    }

    let reward_ratio = total_losing
        .units()
        .checked_mul(REWARD_SCALE)
        .ok_or(ArithmeticError::Overflow)?
        / total_winning.units();
    let winnings = user_stake.mul_by_ratio(reward_ratio, REWARD_SCALE)?;
    let gross = user_stake.checked_add(winnings)?;
    let fee = gross.mul_by_ratio(u128::from(fee_bps), u128::from(BPS_DENOMINATOR))?;
    let net = gross.checked_sub(fee)?;
    Ok(Settlement { gross, fee, net })
}

/// Net payout of a stake on the winning side after the platform fee.
///
/// # Errors
///
/// See [`settle`].
pub fn final_payout(
    user_stake: Money,
    total_winning: Money,
    total_losing: Money,
    fee_bps: u32,
) -> Result<Money, PayoutError> {
    settle(user_stake, total_winning, total_losing, fee_bps).map(|s| s.net)
}

/// The user's proportional share of the losing pool, before resolution.
///
/// ```text
/// proportion = user_stake * 1e6 / total_for_option
/// share      = total_losing * proportion / 1e6
/// ```
///
/// Zero when nothing is staked on the user's option.
///
/// # Errors
///
/// Returns [`ArithmeticError::Overflow`] on intermediate overflow.
pub fn user_share_of_losing_pool(
    user_stake: Money,
    total_for_option: Money,
    total_losing: Money,
) -> Result<Money, ArithmeticError> {
    if total_for_option.is_zero() {
        return Ok(Money::ZERO);
    }
    let proportion = user_stake
        .units()
        .checked_mul(SHARE_PRECISION)
        .ok_or(ArithmeticError::Overflow)?
        / total_for_option.units();
    total_losing.mul_by_ratio(proportion, SHARE_PRECISION)
}

/// What the user would collect, before fees, if `option` wins at current totals.
///
/// Zero when the user holds nothing on `option`.
///
/// # Errors
///
/// Returns [`ArithmeticError::Overflow`] on intermediate overflow.
pub fn potential_winnings(
    position: &UserPosition,
    snapshot: &MarketSnapshot,
    option: StakeOption,
) -> Result<Money, ArithmeticError> {
    let stake = position.stake(option);
    if stake.is_zero() {
        return Ok(Money::ZERO);
    }
    let share = user_share_of_losing_pool(
        stake,
        snapshot.total_stake(option),
        snapshot.total_stake(option.opposite()),
    )?;
    stake.checked_add(share)
}

/// Settlement owed to `position` on a resolved market.
///
/// Nothing is owed while the market is unresolved or when the user has no
/// stake on the winning option.
///
/// # Errors
///
/// See [`settle`].
pub fn claimable_payout(
    position: &UserPosition,
    snapshot: &MarketSnapshot,
    fee_bps: u32,
) -> Result<Settlement, PayoutError> {
    let Some(winner) = snapshot.outcome().winner() else {
        return Ok(Settlement::NOTHING);
    };
    settle(
        position.stake(winner),
        snapshot.total_stake(winner),
        snapshot.total_stake(winner.opposite()),
        fee_bps,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::id::MarketId;
    use crate::domain::market::{MarketTerms, Outcome};
    use chrono::Utc;

    fn m(units: u128) -> Money {
        Money::from_units(units)
    }

    fn snapshot(a: u128, b: u128, outcome: Outcome) -> MarketSnapshot {
        MarketSnapshot::try_new(
            MarketId::new(0),
            MarketTerms {
                question: "Q?".into(),
                option_a: "Yes".into(),
                option_b: "No".into(),
                end_time: Utc::now(),
            },
            m(a),
            m(b),
            outcome,
            outcome != Outcome::Unresolved,
        )
        .unwrap()
    }

    #[test]
    fn odds_are_even_on_empty_pool() {
        let o = odds(&snapshot(0, 0, Outcome::Unresolved));
        assert_eq!(o.pct_a(), 50.0);
        assert_eq!(o.pct_b(), 50.0);
    }

    #[test]
    fn odds_follow_stake_split() {
        let o = odds(&snapshot(600_000_000, 400_000_000, Outcome::Unresolved));
        assert_eq!(o.pct_a(), 60.0);
        assert_eq!(o.pct_b(), 40.0);
    }

    #[test]
    fn odds_truncate_and_stay_within_tolerance() {
        // 1/3 vs 2/3: 33.33 + 66.66 = 99.99
        let o = odds(&snapshot(1, 2, Outcome::Unresolved));
        assert_eq!(o.bps_a(), 3_333);
        assert_eq!(o.bps_b(), 6_666);
        let derived_b = 100.0 - o.pct_a();
        assert!((derived_b - o.pct_b()).abs() <= 0.01 + 1e-9);
    }

    #[test]
    fn odds_one_sided_pool() {
        let o = odds(&snapshot(5, 0, Outcome::Unresolved));
        assert_eq!(o.pct_a(), 100.0);
        assert_eq!(o.pct_b(), 0.0);
    }

    #[test]
    fn odds_survive_huge_totals() {
        let o = odds(&snapshot(u128::MAX, u128::MAX, Outcome::Unresolved));
        assert_eq!(o.bps_a(), 5_000);
        assert_eq!(o.bps_b(), 5_000);
    }

    #[test]
    fn projected_payout_uses_current_pool() {
        let s = snapshot(600_000_000, 400_000_000, Outcome::Unresolved);
        // 60 * 1000 / 600 = 100
        let payout = projected_payout(m(60_000_000), StakeOption::A, &s).unwrap();
        assert_eq!(payout, m(100_000_000));
        // 40 * 1000 / 400 = 100
        let payout = projected_payout(m(40_000_000), StakeOption::B, &s).unwrap();
        assert_eq!(payout, m(100_000_000));
    }

    #[test]
    fn projected_payout_is_breakeven_without_chosen_pool() {
        let s = snapshot(0, 400_000_000, Outcome::Unresolved);
        let payout = projected_payout(m(25_000_000), StakeOption::A, &s).unwrap();
        assert_eq!(payout, m(25_000_000));
    }

    #[test]
    fn settlement_matches_ledger_example() {
        let s = settle(m(100_000_000), m(500_000_000), m(500_000_000), 200).unwrap();
        assert_eq!(s.gross, m(200_000_000));
        assert_eq!(s.fee, m(4_000_000));
        assert_eq!(s.net, m(196_000_000));
    }

    #[test]
    fn zero_fee_pays_gross() {
        let s = settle(m(123_456_789), m(987_654_321), m(333_333_333), 0).unwrap();
        assert_eq!(s.fee, Money::ZERO);
        assert_eq!(s.net, s.gross);
    }

    #[test]
    fn settlement_truncates_like_the_ledger() {
        // ratio = 1 * 1e18 / 3 = 333..333 (18 digits)
        // winnings = 1 * ratio / 1e18 = 0
        let s = settle(m(1), m(3), m(1), 200).unwrap();
        assert_eq!(s.gross, m(1));
        assert_eq!(s.fee, Money::ZERO);
        assert_eq!(s.net, m(1));
    }

    #[test]
    fn losing_pool_past_u128_range_is_an_overflow() {
        let limit = u128::MAX / REWARD_SCALE;
        assert!(settle(m(1), m(1), m(limit), 0).is_ok());
        assert_eq!(
            settle(m(1), m(1), m(limit + 1), 0),
            Err(PayoutError::Arithmetic(ArithmeticError::Overflow))
        );
    }

    #[test]
    fn empty_winning_pool_pays_nothing() {
        assert_eq!(final_payout(Money::ZERO, Money::ZERO, m(10), 200).unwrap(), Money::ZERO);
        assert_eq!(
            final_payout(m(1), Money::ZERO, m(10), 200),
            Err(PayoutError::Validation(ValidationError::NoWinnersToPay))
        );
    }

    #[test]
    fn rejects_stake_larger_than_pool_and_bad_fee() {
        assert!(matches!(
            final_payout(m(11), m(10), m(10), 200),
            Err(PayoutError::Validation(ValidationError::StakeExceedsPool { .. }))
        ));
        assert!(matches!(
            final_payout(m(1), m(10), m(10), 10_001),
            Err(PayoutError::Validation(ValidationError::InvalidFee { fee_bps: 10_001 }))
        ));
    }

    #[test]
    fn payout_is_bounded_by_stake_plus_losing_pool() {
        let cases = [
            (1u128, 1u128, 0u128),
            (1, 7, 1_000_000),
            (3, 3, 1),
            (999_999, 1_000_000, 1),
            (500_000_000, 500_000_000, 500_000_000),
            (1, 1_000_000_000_000, 999_999_999_999),
            (42, 42, 1_000_000_000_000_000),
        ];
        for fee in [0, 200, 10_000] {
            for (user, winning, losing) in cases {
                let net = final_payout(m(user), m(winning), m(losing), fee).unwrap();
                assert!(
                    net.units() <= user + losing,
                    "net {net} > stake {user} + losing {losing} (fee {fee})"
                );
            }
        }
    }

    #[test]
    fn calculations_are_deterministic() {
        let s = snapshot(123_000_000, 456_000_000, Outcome::OptionB);
        assert_eq!(odds(&s), odds(&s));
        let first = final_payout(m(10_000_000), m(456_000_000), m(123_000_000), 200);
        let second = final_payout(m(10_000_000), m(456_000_000), m(123_000_000), 200);
        assert_eq!(first, second);
    }

    #[test]
    fn share_of_losing_pool_is_proportional() {
        // 100 of 400 on A -> 25% of 200 on B = 50
        let share = user_share_of_losing_pool(m(100_000_000), m(400_000_000), m(200_000_000)).unwrap();
        assert_eq!(share, m(50_000_000));
        assert_eq!(
            user_share_of_losing_pool(m(1), Money::ZERO, m(200)).unwrap(),
            Money::ZERO
        );
    }

    #[test]
    fn potential_winnings_add_stake_and_share() {
        let s = snapshot(400_000_000, 200_000_000, Outcome::Unresolved);
        let position = UserPosition::new(m(100_000_000), m(20_000_000));
        assert_eq!(
            potential_winnings(&position, &s, StakeOption::A).unwrap(),
            m(150_000_000)
        );
        // 20 of 200 on B -> 10% of 400 = 40, plus the stake
        assert_eq!(
            potential_winnings(&position, &s, StakeOption::B).unwrap(),
            m(60_000_000)
        );
        assert_eq!(
            potential_winnings(&UserPosition::default(), &s, StakeOption::A).unwrap(),
            Money::ZERO
        );
    }

    #[test]
    fn claimable_payout_uses_the_winning_side() {
        let position = UserPosition::new(m(100_000_000), m(50_000_000));
        let resolved_a = snapshot(500_000_000, 500_000_000, Outcome::OptionA);
        assert_eq!(
            claimable_payout(&position, &resolved_a, 200).unwrap().net,
            m(196_000_000)
        );

        let open = snapshot(500_000_000, 500_000_000, Outcome::Unresolved);
        assert_eq!(claimable_payout(&position, &open, 200).unwrap().net, Money::ZERO);

        let loser = UserPosition::new(m(100_000_000), Money::ZERO);
        let resolved_b = snapshot(500_000_000, 500_000_000, Outcome::OptionB);
        assert_eq!(claimable_payout(&loser, &resolved_b, 200).unwrap().net, Money::ZERO);
    }
}
