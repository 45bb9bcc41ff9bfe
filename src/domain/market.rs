//! Market-related domain types.
//!
//! - [`StakeOption`] - One of the two sides a user can stake on
//! - [`Outcome`] - Resolution result of a market
//! - [`MarketSnapshot`] - Immutable point-in-time view of a market read from the ledger
//! - [`MarketProposal`] - Terms of a market the owner is about to create

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::id::MarketId;
use super::money::Money;

/// One of the two options of a binary market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StakeOption {
    A,
    B,
}

impl StakeOption {
    /// The other side of the market.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    /// Option code used by the ledger's stake call.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }
}

impl fmt::Display for StakeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// Resolution result of a market.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    #[default]
    Unresolved,
    OptionA,
    OptionB,
}

impl Outcome {
    /// Decode the ledger's outcome code (`0` unresolved, `1` A, `2` B).
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownOutcome`] for any other code.
    pub fn from_code(code: u8) -> Result<Self, ValidationError> {
        match code {
            0 => Ok(Self::Unresolved),
            1 => Ok(Self::OptionA),
            2 => Ok(Self::OptionB),
            other => Err(ValidationError::UnknownOutcome(other)),
        }
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Unresolved => 0,
            Self::OptionA => 1,
            Self::OptionB => 2,
        }
    }

    /// The winning option, if resolved.
    #[must_use]
    pub const fn winner(self) -> Option<StakeOption> {
        match self {
            Self::Unresolved => None,
            Self::OptionA => Some(StakeOption::A),
            Self::OptionB => Some(StakeOption::B),
        }
    }
}

/// Display terms of a market: the question and the two option labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketTerms {
    pub question: String,
    pub option_a: String,
    pub option_b: String,
    pub end_time: DateTime<Utc>,
}

/// A market to be created, before the ledger assigns its id and end time.
///
/// The ledger sets the end time to the creation block time plus `duration`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketProposal {
    pub question: String,
    pub option_a: String,
    pub option_b: String,
    pub duration: Duration,
    /// Category to assign once the market exists.
    pub category: Option<String>,
}

impl MarketProposal {
    /// Markets stay open for 30 days unless told otherwise.
    pub const DEFAULT_DURATION_SECS: i64 = 30 * 24 * 60 * 60;

    #[must_use]
    pub fn new(
        question: impl Into<String>,
        option_a: impl Into<String>,
        option_b: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            option_a: option_a.into(),
            option_b: option_b.into(),
            duration: Duration::seconds(Self::DEFAULT_DURATION_SECS),
            category: None,
        }
    }

    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Check the fields the ledger would otherwise accept blindly.
    ///
    /// # Errors
    ///
    /// [`ValidationError::EmptyField`] for a blank question or option label,
    /// [`ValidationError::InvalidDuration`] unless the duration is positive.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("question", &self.question),
            ("option_a", &self.option_a),
            ("option_b", &self.option_b),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::EmptyField(field));
            }
        }
        if self.duration <= Duration::zero() {
            return Err(ValidationError::InvalidDuration {
                seconds: self.duration.num_seconds(),
            });
        }
        Ok(())
    }

    /// Duration in whole seconds, as the ledger's create call expects.
    #[must_use]
    pub fn duration_secs(&self) -> u64 {
        u64::try_from(self.duration.num_seconds()).unwrap_or(0)
    }
}

/// Immutable view of one market as last read from the ledger.
///
/// A refresh never mutates a snapshot; it replaces it with a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketSnapshot {
    market_id: MarketId,
    terms: MarketTerms,
    outcome: Outcome,
    total_stake_a: Money,
    total_stake_b: Money,
    resolved: bool,
}

impl MarketSnapshot {
    /// Create a snapshot, checking that `resolved` agrees with `outcome`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InconsistentResolution`] when
    /// `resolved != (outcome != Unresolved)`.
    pub fn try_new(
        market_id: MarketId,
        terms: MarketTerms,
        total_stake_a: Money,
        total_stake_b: Money,
        outcome: Outcome,
        resolved: bool,
    ) -> Result<Self, ValidationError> {
        if resolved != (outcome != Outcome::Unresolved) {
            return Err(ValidationError::InconsistentResolution {
                market_id,
                resolved,
                outcome_code: outcome.code(),
            });
        }
        Ok(Self {
            market_id,
            terms,
            outcome,
            total_stake_a,
            total_stake_b,
            resolved,
        })
    }

    #[must_use]
    pub const fn market_id(&self) -> MarketId {
        self.market_id
    }

    #[must_use]
    pub fn question(&self) -> &str {
        &self.terms.question
    }

    /// Label of the given option.
    #[must_use]
    pub fn option_label(&self, option: StakeOption) -> &str {
        match option {
            StakeOption::A => &self.terms.option_a,
            StakeOption::B => &self.terms.option_b,
        }
    }

    #[must_use]
    pub const fn terms(&self) -> &MarketTerms {
        &self.terms
    }

    #[must_use]
    pub const fn end_time(&self) -> DateTime<Utc> {
        self.terms.end_time
    }

    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        self.outcome
    }

    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.resolved
    }

    #[must_use]
    pub const fn total_stake_a(&self) -> Money {
        self.total_stake_a
    }

    #[must_use]
    pub const fn total_stake_b(&self) -> Money {
        self.total_stake_b
    }

    /// Total staked on the given option.
    #[must_use]
    pub const fn total_stake(&self, option: StakeOption) -> Money {
        match option {
            StakeOption::A => self.total_stake_a,
            StakeOption::B => self.total_stake_b,
        }
    }

    /// Combined pool of both options, saturating at [`Money::MAX`].
    #[must_use]
    pub fn total_pool(&self) -> Money {
        Money::from_units(
            self.total_stake_a
                .units()
                .saturating_add(self.total_stake_b.units()),
        )
    }
}
