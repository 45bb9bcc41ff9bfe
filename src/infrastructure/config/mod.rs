//! Infrastructure configuration modules.

pub mod banner;
pub mod ledger;
pub mod logging;
pub mod market;
pub mod settings;
