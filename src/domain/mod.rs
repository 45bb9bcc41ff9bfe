//! Exchange-agnostic domain logic.
//!
//! Everything in here is pure: no I/O, no clocks, no locks. Time enters as an
//! explicit `now` argument and ledger data as immutable snapshots.

pub mod banner;
pub mod error;
pub mod id;
pub mod lifecycle;
pub mod market;
pub mod money;
pub mod payout;
pub mod position;

pub use banner::{BannerDirectory, BannerEntry};
pub use error::{ArithmeticError, ValidationError};
pub use id::{BannerId, MarketId, TxHandle, UserId};
pub use lifecycle::{classify, time_remaining, LifecycleState};
pub use market::{MarketProposal, MarketSnapshot, MarketTerms, Outcome, StakeOption};
pub use money::Money;
pub use payout::{Odds, PayoutError, Settlement};
pub use position::UserPosition;
