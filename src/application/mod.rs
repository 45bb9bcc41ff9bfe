//! Application services (use cases).
//!
//! These services combine the pure domain with the ledger and banner ports:
//! the position book, the market directory, the staking and claim state
//! machines, the session that exposes them to a presentation layer, and the
//! owner's market administration.

pub mod admin;
pub mod banner;
pub mod claim;
pub mod deadline;
pub mod directory;
pub mod position;
pub mod registry;
pub mod session;
pub mod staking;

pub use admin::{AdminSettings, MarketAdmin};
pub use banner::BannerService;
pub use claim::{ClaimOrchestrator, ClaimPhase};
pub use deadline::Deadline;
pub use directory::{CategoryMap, MarketDirectory, MarketFilter, RefreshReport};
pub use position::PositionBook;
pub use registry::FlowRegistry;
pub use session::{MarketSession, SessionSettings};
pub use staking::{
    ApprovalMode, CancelOutcome, StakeFailure, StakePhase, StakeSettings, StakeTicket,
    StakingOrchestrator,
};
