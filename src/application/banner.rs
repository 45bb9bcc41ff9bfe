//! Banner service: the bounded banner directory backed by an injected store.
//!
//! A publish returns the stored entry and inserts it directly; the store is
//! listed only by [`BannerService::load`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::domain::{BannerDirectory, BannerEntry, MarketId};
use crate::error::Result;
use crate::port::BannerStore;

pub struct BannerService {
    store: Arc<dyn BannerStore>,
    directory: Mutex<BannerDirectory>,
}

impl BannerService {
    /// Create a service with an empty directory of `capacity` entries.
    #[must_use]
    pub fn new(store: Arc<dyn BannerStore>, capacity: usize) -> Self {
        Self {
            store,
            directory: Mutex::new(BannerDirectory::new(capacity)),
        }
    }

    /// Seed the directory from the store, keeping the newest entries.
    ///
    /// # Errors
    ///
    /// Returns a remote error if the store cannot be listed; the directory is
    /// left unchanged.
    pub async fn load(&self) -> Result<usize> {
        let listed = self.store.list_banners().await?;
        let total = listed.len();
        let mut directory = self.directory.lock();
        directory.replace_all(listed);
        info!(listed = total, kept = directory.len(), "Banners loaded");
        Ok(directory.len())
    }

    /// Store `image` as a new banner for `market_id`.
    ///
    /// The id is derived from `now`. If the directory is full the oldest
    /// banner is evicted.
    ///
    /// # Errors
    ///
    /// Returns a remote error if the store rejects the upload; the directory
    /// is left unchanged.
    pub async fn publish(
        &self,
        image: Vec<u8>,
        market_id: MarketId,
        title: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<BannerEntry> {
        let id = self.directory.lock().next_id(now);
        let image_reference = self.store.put_banner(image, id).await?;
        let entry = BannerEntry {
            id,
            image_reference,
            market_id,
            title: title.into(),
        };
        let evicted = self.directory.lock().insert(entry.clone());
        info!(banner_id = %id, market_id = %market_id, "Banner published");
        if let Some(old) = evicted {
            debug!(banner_id = %old.id, market_id = %old.market_id, "Banner evicted");
        }
        Ok(entry)
    }

    /// Current banners, newest first.
    #[must_use]
    pub fn entries(&self) -> Vec<BannerEntry> {
        self.directory.lock().entries().cloned().collect()
    }

    /// Drop every banner pointing at `market_id`.
    pub fn remove_market(&self, market_id: MarketId) -> Vec<BannerEntry> {
        let removed = self.directory.lock().remove_market(market_id);
        if !removed.is_empty() {
            info!(market_id = %market_id, removed = removed.len(), "Banners removed");
        }
        removed
    }
}
