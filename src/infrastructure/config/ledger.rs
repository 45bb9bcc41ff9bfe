//! Ledger connection configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::application::{ApprovalMode, Deadline, StakeSettings};
use crate::domain::UserId;

/// Sepolia testnet.
pub const DEFAULT_CHAIN_ID: u64 = 11_155_111;

/// Ledger configuration.
///
/// Wallet connection and signing are configured by the client implementation,
/// not here.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Address of the prediction market contract.
    #[serde(default)]
    pub contract_address: String,
    /// Address of the stake token contract.
    #[serde(default)]
    pub token_address: String,
    /// Deadline for each remote step in seconds; `0` waits indefinitely.
    #[serde(default = "default_remote_timeout_secs")]
    pub remote_timeout_secs: u64,
    #[serde(default)]
    pub approval_mode: ApprovalMode,
    /// Contract owner, allowed to create and resolve markets.
    #[serde(default)]
    pub owner_address: Option<String>,
}

const fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}

const fn default_remote_timeout_secs() -> u64 {
    60
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            contract_address: String::new(),
            token_address: String::new(),
            remote_timeout_secs: default_remote_timeout_secs(),
            approval_mode: ApprovalMode::default(),
            owner_address: None,
        }
    }
}

impl LedgerConfig {
    #[must_use]
    pub const fn deadline(&self) -> Deadline {
        if self.remote_timeout_secs == 0 {
            Deadline::NONE
        } else {
            Deadline::after(Duration::from_secs(self.remote_timeout_secs))
        }
    }

    #[must_use]
    pub fn owner(&self) -> Option<UserId> {
        self.owner_address.as_deref().map(UserId::new)
    }

    #[must_use]
    pub const fn stake_settings(&self) -> StakeSettings {
        StakeSettings {
            approval_mode: self.approval_mode,
            deadline: self.deadline(),
        }
    }
}

/// `0x` followed by 40 hex digits.
pub(super) fn is_address(value: &str) -> bool {
    value
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_disables_deadline() {
        let config = LedgerConfig {
            remote_timeout_secs: 0,
            ..LedgerConfig::default()
        };
        assert_eq!(config.deadline(), Deadline::NONE);
        assert_eq!(
            LedgerConfig::default().deadline().limit(),
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn address_shape() {
        assert!(is_address("0xD7AaA81D7166B8De1bC0F378eE641183864D0405"));
        assert!(!is_address("D7AaA81D7166B8De1bC0F378eE641183864D0405"));
        assert!(!is_address("0x1234"));
        assert!(!is_address("0xZZAaA81D7166B8De1bC0F378eE641183864D0405"));
    }
}
