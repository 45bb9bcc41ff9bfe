//! Builders for domain values used across tests.

use chrono::{DateTime, Duration, Utc};

use super::ledger::MemoryLedger;
use crate::domain::{MarketId, MarketSnapshot, MarketTerms, Money, Outcome};

/// `tokens` whole stake tokens.
pub fn usdc(tokens: u128) -> Money {
    Money::from_whole(tokens).unwrap_or(Money::MAX)
}

/// Binary terms ending at `end_time`.
pub fn terms(question: &str, end_time: DateTime<Utc>) -> MarketTerms {
    MarketTerms {
        question: question.to_string(),
        option_a: "Yes".to_string(),
        option_b: "No".to_string(),
        end_time,
    }
}

/// Snapshot of market `id` with the given totals in base units.
///
/// The resolved flag follows `outcome`.
pub fn snapshot(
    id: u64,
    end_time: DateTime<Utc>,
    total_a: Money,
    total_b: Money,
    outcome: Outcome,
) -> MarketSnapshot {
    MarketSnapshot::try_new(
        MarketId::new(id),
        terms(&format!("Market {id}?"), end_time),
        total_a,
        total_b,
        outcome,
        outcome != Outcome::Unresolved,
    )
    .unwrap_or_else(|e| panic!("inconsistent test snapshot: {e}"))
}

/// Create a market on `ledger` that closes in a week.
pub fn future_market(ledger: &MemoryLedger) -> MarketId {
    ledger.create_market(
        "Will Bitcoin hit $100K?",
        "Yes",
        "No",
        Utc::now() + Duration::days(7),
    )
}

/// Create a market on `ledger` that closed yesterday.
pub fn past_market(ledger: &MemoryLedger) -> MarketId {
    ledger.create_market(
        "Did it rain yesterday?",
        "Yes",
        "No",
        Utc::now() - Duration::days(1),
    )
}
