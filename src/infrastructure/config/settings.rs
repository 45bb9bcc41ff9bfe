//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings.
//! Configuration is loaded from a TOML file; secrets such as the banner store
//! token come only from the environment (`BANNER_STORE_TOKEN`), optionally
//! via a `.env` file.
//!
//! # Example
//!
//! ```no_run
//! use truthstake::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use super::banner::{BannerConfig, BANNER_TOKEN_ENV};
use super::ledger::{is_address, LedgerConfig};
use super::logging::LoggingConfig;
use super::market::MarketConfig;
use crate::application::{AdminSettings, CategoryMap, SessionSettings};
use crate::domain::payout::BPS_DENOMINATOR;
use crate::error::{ConfigError, Result};

/// Main application configuration.
///
/// Load from a TOML file using [`Config::load`] or parse directly with
/// [`Config::parse_toml`]. Constructors receive the projections
/// [`Config::session_settings`] and [`Config::category_map`].
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Logging and tracing configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Ledger network, contract addresses and remote call policy.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Platform fee and category catalog.
    #[serde(default)]
    pub market: MarketConfig,

    /// Banner directory capacity and store naming.
    #[serde(default)]
    pub banner: BannerConfig,
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// Reads the banner store token from the `BANNER_STORE_TOKEN` environment
    /// variable.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The TOML content is malformed
    /// - Validation fails (e.g., a fee above 100%)
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;

        // Never from the config file
        config.banner.token = std::env::var(BANNER_TOKEN_ENV)
            .ok()
            .filter(|token| !token.is_empty());

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// A `.env` file in the working directory, if present, is loaded into the
    /// environment first.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML content is malformed
    /// - Validation fails
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Validate configuration values.
    #[allow(clippy::result_large_err)]
    fn validate(&self) -> Result<()> {
        if self.ledger.contract_address.is_empty() {
            return Err(ConfigError::MissingField {
                field: "contract_address",
            }
            .into());
        }
        if !is_address(&self.ledger.contract_address) {
            return Err(ConfigError::InvalidValue {
                field: "contract_address",
                reason: "must be 0x followed by 40 hex digits".to_string(),
            }
            .into());
        }
        if self.ledger.token_address.is_empty() {
            return Err(ConfigError::MissingField {
                field: "token_address",
            }
            .into());
        }
        if !is_address(&self.ledger.token_address) {
            return Err(ConfigError::InvalidValue {
                field: "token_address",
                reason: "must be 0x followed by 40 hex digits".to_string(),
            }
            .into());
        }
        if let Some(owner) = &self.ledger.owner_address {
            if !is_address(owner) {
                return Err(ConfigError::InvalidValue {
                    field: "owner_address",
                    reason: "must be 0x followed by 40 hex digits".to_string(),
                }
                .into());
            }
        }
        if self.ledger.chain_id == 0 {
            return Err(ConfigError::InvalidValue {
                field: "chain_id",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.market.fee_bps > BPS_DENOMINATOR {
            return Err(ConfigError::InvalidValue {
                field: "fee_bps",
                reason: format!("must be at most {BPS_DENOMINATOR}"),
            }
            .into());
        }
        if self.market.categories.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "categories",
                reason: "must list at least one category".to_string(),
            }
            .into());
        }
        if self.market.market_duration_days == 0 {
            return Err(ConfigError::InvalidValue {
                field: "market_duration_days",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if let Err(e) = self.market.category_map() {
            return Err(ConfigError::InvalidValue {
                field: "assignments",
                reason: e.to_string(),
            }
            .into());
        }

        if self.banner.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "capacity",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.banner.prefix.is_empty() {
            return Err(ConfigError::MissingField { field: "prefix" }.into());
        }
        Ok(())
    }

    /// Settings every session is constructed with.
    #[must_use]
    pub const fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            stake: self.ledger.stake_settings(),
            fee_bps: self.market.fee_bps,
        }
    }

    /// Settings of the owner service.
    #[must_use]
    pub fn admin_settings(&self) -> AdminSettings {
        AdminSettings {
            owner: self.ledger.owner(),
            deadline: self.ledger.deadline(),
            market_duration: chrono::Duration::days(i64::from(self.market.market_duration_days)),
        }
    }

    /// Category catalog and assignments for the market directory.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an assignment to an unknown category.
    /// Cannot fail on a config that passed [`Config::load`].
    pub fn category_map(&self) -> Result<CategoryMap> {
        Ok(self.market.category_map()?)
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}
