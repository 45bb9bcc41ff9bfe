//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe the external collaborators of the core: the
//! remote ledger and the banner image store.

pub mod banner;
pub mod ledger;
