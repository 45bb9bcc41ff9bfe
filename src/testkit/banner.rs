//! In-memory [`BannerStore`] keyed by object name.
//!
//! Like a blob store, it only knows object names: a listed object carries the
//! market and title it was seeded with, or market `0` and `Banner <id>` when
//! it was uploaded through [`BannerStore::put_banner`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use crate::domain::banner::{object_name, parse_object_name};
use crate::domain::{BannerEntry, BannerId, MarketId};
use crate::port::{BannerStore, RemoteError};

#[derive(Debug)]
struct StoredObject {
    size: usize,
    market_id: MarketId,
    title: String,
}

pub struct MemoryBannerStore {
    base_url: String,
    prefix: String,
    objects: Mutex<BTreeMap<String, StoredObject>>,
    failures: Mutex<Vec<RemoteError>>,
    list_calls: AtomicUsize,
    put_calls: AtomicUsize,
}

impl MemoryBannerStore {
    /// `base_url` must end with `/`; objects are served at `<base_url><name>`.
    pub fn new(base_url: &str, prefix: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            prefix: prefix.to_string(),
            objects: Mutex::new(BTreeMap::new()),
            failures: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
            put_calls: AtomicUsize::new(0),
        }
    }

    /// Store an object with known metadata.
    pub fn seed(&self, id: BannerId, market_id: MarketId, title: &str) {
        self.objects.lock().insert(
            object_name(&self.prefix, id),
            StoredObject {
                size: 0,
                market_id,
                title: title.to_string(),
            },
        );
    }

    /// Fail the next call with `error`.
    pub fn fail_next(&self, error: RemoteError) {
        self.failures.lock().push(error);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    /// Size in bytes of a stored object.
    pub fn object_size(&self, id: BannerId) -> Option<usize> {
        self.objects
            .lock()
            .get(&object_name(&self.prefix, id))
            .map(|o| o.size)
    }

    fn url(&self, name: &str) -> Result<Url, RemoteError> {
        Url::parse(&format!("{}{name}", self.base_url))
            .map_err(|e| RemoteError::Unavailable(e.to_string()))
    }

    fn take_failure(&self) -> Result<(), RemoteError> {
        let mut failures = self.failures.lock();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures.remove(0))
        }
    }
}

#[async_trait]
impl BannerStore for MemoryBannerStore {
    async fn list_banners(&self) -> Result<Vec<BannerEntry>, RemoteError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;
        let objects = self.objects.lock();
        objects
            .iter()
            .filter_map(|(name, object)| {
                parse_object_name(&self.prefix, name).map(|id| (name, id, object))
            })
            .map(|(name, id, object)| {
                Ok(BannerEntry {
                    id,
                    image_reference: self.url(name)?,
                    market_id: object.market_id,
                    title: object.title.clone(),
                })
            })
            .collect()
    }

    async fn put_banner(&self, image: Vec<u8>, declared_id: BannerId) -> Result<Url, RemoteError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;
        let name = object_name(&self.prefix, declared_id);
        let url = self.url(&name)?;
        self.objects.lock().insert(
            name,
            StoredObject {
                size: image.len(),
                market_id: MarketId::new(0),
                title: format!("Banner {declared_id}"),
            },
        );
        Ok(url)
    }
}
