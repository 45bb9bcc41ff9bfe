//! Market lifecycle classification.
//!
//! The lifecycle state is never stored. It is a projection of a snapshot and
//! the current time, so `Active` turns into `Pending` purely by the clock
//! advancing. Callers must classify on every read and never cache the result
//! across a refresh or a time boundary.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::market::MarketSnapshot;

/// Point-in-time lifecycle state of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LifecycleState {
    /// Accepting stakes (`now < end_time`).
    Active,
    /// Betting closed, awaiting resolution.
    Pending,
    /// Outcome published; terminal.
    Resolved,
}

impl LifecycleState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a snapshot at `now`.
///
/// A resolved market is `Resolved` regardless of time.
#[must_use]
pub fn classify(snapshot: &MarketSnapshot, now: DateTime<Utc>) -> LifecycleState {
    if snapshot.is_resolved() {
        LifecycleState::Resolved
    } else if now < snapshot.end_time() {
        LifecycleState::Active
    } else {
        LifecycleState::Pending
    }
}

/// Time left until betting closes, or `None` once it has.
#[must_use]
pub fn time_remaining(snapshot: &MarketSnapshot, now: DateTime<Utc>) -> Option<Duration> {
    let remaining = snapshot.end_time() - now;
    (remaining > Duration::zero()).then_some(remaining)
}
