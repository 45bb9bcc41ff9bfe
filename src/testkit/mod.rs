//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`ledger`]: [`MemoryLedger`](ledger::MemoryLedger), an in-memory
//!   contract with scripted failures, call counters and call gates.
//! - [`banner`]: [`MemoryBannerStore`](banner::MemoryBannerStore).
//! - [`domain`]: Builders for amounts, terms, snapshots and markets.

pub mod banner;
pub mod domain;
pub mod ledger;
