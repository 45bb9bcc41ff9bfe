//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! Ports define the extension points in the hexagonal architecture.
//! They are traits that adapters implement to integrate with external
//! systems.
//!
//! # Architecture
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │      Application        │
//!     ┌──────────────┤  Domain + Port          ├──────────────┐
//!     │              └─────────────────────────┘              │
//!     ▼                                                       ▼
//! ┌─────────┐                                           ┌───────────┐
//! │ Ledger  │                                           │  Banner   │
//! │ Adapter │                                           │   Store   │
//! └─────────┘                                           └───────────┘
//! ```
//!
//! # Available Ports
//!
//! - [`LedgerClient`] - Market reads, allowance, approval, stake and claim submission
//! - [`BannerStore`] - Banner image storage

pub mod outbound;

pub use outbound::banner::BannerStore;
pub use outbound::ledger::{LedgerClient, MarketSnapshotRaw, Receipt, RemoteError};
