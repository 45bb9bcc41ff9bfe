//! Infrastructure layer.
//!
//! Provides technical concerns that support the application without containing
//! business logic.
//!
//! # Submodules
//!
//! - [`config`] - Configuration loading, validation and logging setup
//! - [`bootstrap`] - Composition root wiring configuration into services

pub mod bootstrap;
pub mod config;
