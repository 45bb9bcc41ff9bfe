//! Composition root: wire configuration and injected ports into services.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::{
    AdminSettings, BannerService, FlowRegistry, MarketAdmin, MarketDirectory, MarketSession,
    PositionBook, RefreshReport, SessionSettings,
};
use crate::domain::UserId;
use crate::error::Result;
use crate::infrastructure::config::banner::BannerStoreSettings;
use crate::infrastructure::config::settings::Config;
use crate::port::{BannerStore, LedgerClient};

/// Shared services of one running client.
///
/// The directory, position book and stake/claim registry are shared by every
/// session; each connected wallet gets its own [`MarketSession`] view.
pub struct Services {
    ledger: Arc<dyn LedgerClient>,
    directory: Arc<MarketDirectory>,
    positions: Arc<PositionBook>,
    flows: Arc<FlowRegistry>,
    banners: BannerService,
    settings: SessionSettings,
    admin: AdminSettings,
}

impl Services {
    /// Build the services from a validated configuration.
    ///
    /// `connect_banner_store` receives the configured object prefix and the
    /// store token and returns the store adapter.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a category assignment names an unknown
    /// category, or whatever `connect_banner_store` returns.
    pub fn build<F>(
        config: &Config,
        ledger: Arc<dyn LedgerClient>,
        connect_banner_store: F,
    ) -> Result<Self>
    where
        F: FnOnce(&BannerStoreSettings) -> Result<Arc<dyn BannerStore>>,
    {
        let directory = Arc::new(MarketDirectory::new(config.category_map()?));
        let settings = config.session_settings();
        let store_settings = config.banner.store_settings();
        if store_settings.token.is_none() {
            warn!("No banner store token set, uploads may be refused");
        }
        let banner_store = connect_banner_store(&store_settings)?;
        info!(
            chain_id = config.ledger.chain_id,
            contract = %config.ledger.contract_address,
            fee_bps = settings.fee_bps,
            banner_prefix = %store_settings.prefix,
            "Services configured"
        );
        Ok(Self {
            ledger,
            directory,
            positions: Arc::new(PositionBook::new()),
            flows: Arc::new(FlowRegistry::new()),
            banners: BannerService::new(banner_store, config.banner.capacity),
            settings,
            admin: config.admin_settings(),
        })
    }

    #[must_use]
    pub fn directory(&self) -> &Arc<MarketDirectory> {
        &self.directory
    }

    #[must_use]
    pub const fn banners(&self) -> &BannerService {
        &self.banners
    }

    /// Open a session for a connected wallet.
    ///
    /// Sessions of the same wallet share its positions and its stake and
    /// claim state.
    #[must_use]
    pub fn session(&self, user: UserId) -> MarketSession {
        MarketSession::new(
            user,
            Arc::clone(&self.ledger),
            Arc::clone(&self.directory),
            Arc::clone(&self.positions),
            Arc::clone(&self.flows),
            self.settings,
        )
    }

    /// Owner operations on behalf of `user`.
    #[must_use]
    pub fn admin(&self, user: UserId) -> MarketAdmin {
        MarketAdmin::new(
            user,
            Arc::clone(&self.ledger),
            Arc::clone(&self.directory),
            self.admin.clone(),
        )
    }

    /// Load every market and the banner list.
    ///
    /// A banner store failure is logged and does not fail the warm-up.
    ///
    /// # Errors
    ///
    /// Returns a remote error if the market count cannot be read.
    pub async fn warm_up(&self) -> Result<RefreshReport> {
        let (markets, banners) = tokio::join!(
            self.directory.refresh_all(self.ledger.as_ref()),
            self.banners.load()
        );
        if let Err(e) = banners {
            warn!(error = %e, "Failed to load banners");
        }
        markets
    }
}
