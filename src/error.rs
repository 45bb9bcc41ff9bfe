use thiserror::Error;

use crate::domain::{ArithmeticError, MarketId, PayoutError, ValidationError};
use crate::port::RemoteError;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Illegal state transitions of the orchestrators.
///
/// These are rejected with no side effect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("a stake on market {market_id} is already in progress")]
    AlreadyInProgress { market_id: MarketId },

    #[error("winnings of market {market_id} were already claimed")]
    AlreadyClaimed { market_id: MarketId },

    #[error("a remote call is in flight")]
    RemoteCallInFlight,

    #[error("cannot {action} while {phase}")]
    InvalidTransition {
        phase: &'static str,
        action: &'static str,
    },

    #[error("no stake in progress on market {market_id}")]
    NoActiveStake { market_id: MarketId },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// True if the failed step may be retried as is.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl From<PayoutError> for Error {
    fn from(err: PayoutError) -> Self {
        match err {
            PayoutError::Validation(e) => Self::Validation(e),
            PayoutError::Arithmetic(e) => Self::Arithmetic(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
