//! Banner store configuration.

use serde::Deserialize;

use crate::domain::banner::DEFAULT_BANNER_CAPACITY;

/// Environment variable holding the banner store access token.
pub const BANNER_TOKEN_ENV: &str = "BANNER_STORE_TOKEN";

/// What a banner store adapter needs to connect.
#[derive(Clone, PartialEq, Eq)]
pub struct BannerStoreSettings {
    /// Object name prefix; images are stored as `<prefix><id>.png`.
    pub prefix: String,
    pub token: Option<String>,
}

impl std::fmt::Debug for BannerStoreSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BannerStoreSettings")
            .field("prefix", &self.prefix)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Banner configuration.
/// The store token is loaded from `BANNER_STORE_TOKEN` env var at runtime (never from config file).
#[derive(Debug, Clone, Deserialize)]
pub struct BannerConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Object name prefix; images are stored as `<prefix><id>.png`.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(skip)]
    pub token: Option<String>,
}

const fn default_capacity() -> usize {
    DEFAULT_BANNER_CAPACITY
}

fn default_prefix() -> String {
    "banner_".into()
}

impl BannerConfig {
    #[must_use]
    pub fn store_settings(&self) -> BannerStoreSettings {
        BannerStoreSettings {
            prefix: self.prefix.clone(),
            token: self.token.clone(),
        }
    }
}

impl Default for BannerConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            prefix: default_prefix(),
            token: None,
        }
    }
}
