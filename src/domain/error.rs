//! Domain validation and arithmetic errors.
//!
//! [`ValidationError`] is returned whenever user input or ledger data breaks
//! a domain rule. It is always recoverable locally: the intent is rejected and
//! nothing changes. [`ArithmeticError`] signals an overflow or underflow in
//! [`Money`](super::money::Money) arithmetic and is treated as a defect; the
//! operation is aborted and the value is never clamped.
//!
//! # Examples
//!
//! ```
//! use truthstake::domain::error::ValidationError;
//! use truthstake::domain::money::Money;
//!
//! let result = "-1".parse::<Money>();
//! assert!(matches!(result, Err(ValidationError::InvalidMoney { .. })));
//! ```

use thiserror::Error;

use super::id::{MarketId, UserId};
use super::lifecycle::LifecycleState;
use super::money::Money;

/// Overflow and underflow failures of fixed-point arithmetic.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticError {
    /// The result does not fit in the underlying integer.
    #[error("arithmetic overflow")]
    Overflow,

    /// The result would be negative.
    #[error("arithmetic underflow")]
    Underflow,

    /// A ratio was requested with a zero denominator.
    #[error("division by zero")]
    DivisionByZero,
}

/// Errors that occur when domain invariants or user input rules are violated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Stake amounts must be strictly positive.
    #[error("amount must be positive, got {amount}")]
    InvalidAmount {
        /// The rejected amount.
        amount: Money,
    },

    /// Text could not be parsed as a 6-decimal amount.
    #[error("invalid amount '{input}': {reason}")]
    InvalidMoney {
        /// The raw user input.
        input: String,
        /// Why parsing failed.
        reason: &'static str,
    },

    /// The ledger reported a resolved flag that disagrees with the outcome.
    #[error("market {market_id}: resolved={resolved} contradicts outcome code {outcome_code}")]
    InconsistentResolution {
        market_id: MarketId,
        resolved: bool,
        outcome_code: u8,
    },

    /// The ledger reported an outcome code outside the known range.
    #[error("unknown outcome code {0}")]
    UnknownOutcome(u8),

    /// The ledger reported an end time that is not a representable timestamp.
    #[error("invalid end time {0}")]
    InvalidEndTime(u64),

    /// The fee exceeds 100%.
    #[error("fee of {fee_bps} bps exceeds 10000")]
    InvalidFee {
        /// The rejected fee in basis points.
        fee_bps: u32,
    },

    /// A user stake larger than the pool it belongs to.
    #[error("user stake {user_stake} exceeds option pool {pool}")]
    StakeExceedsPool { user_stake: Money, pool: Money },

    /// The winning pool is empty while a non-zero stake claims a share of it.
    #[error("no winning stake to distribute the losing pool to")]
    NoWinnersToPay,

    /// The market is not known to the directory.
    #[error("unknown market {0}")]
    UnknownMarket(MarketId),

    /// The market no longer accepts stakes.
    #[error("market {market_id} is {state}, stakes are closed")]
    MarketClosed {
        market_id: MarketId,
        state: LifecycleState,
    },

    /// The market cannot be claimed in its current lifecycle state.
    #[error("market {market_id} is {state}, not claimable")]
    NotClaimable {
        market_id: MarketId,
        state: LifecycleState,
    },

    /// The market is resolved but the user holds nothing on the winning side.
    #[error("nothing to claim on market {0}")]
    NothingToClaim(MarketId),

    /// The category label is not part of the configured catalog.
    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    /// A required text field of a market proposal is blank.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// Markets must stay open for a positive number of seconds.
    #[error("market duration must be positive, got {seconds}s")]
    InvalidDuration { seconds: i64 },

    /// Only a market past its end time and not yet resolved can be resolved.
    #[error("market {market_id} is {state}, cannot be resolved")]
    NotResolvable {
        market_id: MarketId,
        state: LifecycleState,
    },

    /// A market is resolved to option A or option B, never back to unresolved.
    #[error("a market can only be resolved to option A or option B")]
    UnresolvedOutcome,

    /// Creating and resolving markets is reserved to the contract owner.
    #[error("{0} is not the market owner")]
    NotOwner(UserId),
}
