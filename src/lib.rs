//! Truthstake - accounting and transaction orchestration for a pari-mutuel
//! prediction market client.
//!
//! The authoritative market state lives on a remote ledger (a smart contract
//! and its stake token). This crate is the part of the client that must be
//! correct regardless of how it is rendered: it tracks stake totals and user
//! positions, computes odds and payouts with the ledger's own fixed-point
//! arithmetic, classifies markets by lifecycle, and sequences the
//! allowance → approval → stake → confirmation steps with explicit handling
//! of failure, retry and cancellation.
//!
//! # Architecture
//!
//! - **`domain`** - Pure types and calculations: money, snapshots, lifecycle,
//!   odds and payouts, positions, banners
//! - **`port`** - Traits for the remote ledger and the banner store
//! - **`application`** - Position book, market directory, staking and claim
//!   state machines, the flow registry, owner operations and the per-user
//!   session
//! - **`infrastructure`** - Configuration, logging and service wiring
//!
//! # Modules
//!
//! - [`domain`] - Ledger-agnostic domain logic
//! - [`port`] - Port traits implemented by ledger and storage adapters
//! - [`application`] - Use cases driving the domain through the ports
//! - [`infrastructure`] - Configuration loading and composition root
//! - [`error`] - Error types for the crate
//!
//! # Features
//!
//! - `testkit` - In-memory ledger and banner store for integration tests
//!
//! # Example
//!
//! ```
//! use truthstake::domain::payout::final_payout;
//! use truthstake::domain::Money;
//!
//! let net = final_payout(
//!     Money::from_units(100_000_000),
//!     Money::from_units(500_000_000),
//!     Money::from_units(500_000_000),
//!     200,
//! )
//! .unwrap();
//! assert_eq!(net, Money::from_units(196_000_000));
//! ```

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
