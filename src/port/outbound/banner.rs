//! Banner store port for promotional images.
//!
//! The store is opaque blob storage; the core only keeps the bounded
//! in-memory [`BannerDirectory`](crate::domain::BannerDirectory).

use async_trait::async_trait;
use url::Url;

use super::ledger::RemoteError;
use crate::domain::{BannerEntry, BannerId};

/// Port for persistent banner image storage.
///
/// Implementations receive their access credentials at construction; none
/// are embedded in the core.
#[async_trait]
pub trait BannerStore: Send + Sync {
    /// List every stored banner.
    async fn list_banners(&self) -> Result<Vec<BannerEntry>, RemoteError>;

    /// Store an image under `declared_id` and return its public URL.
    async fn put_banner(&self, image: Vec<u8>, declared_id: BannerId) -> Result<Url, RemoteError>;
}
