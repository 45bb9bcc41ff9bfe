//! Promotional banners pointing at markets.
//!
//! [`BannerDirectory`] is a bounded, newest-first list: inserting into a full
//! directory evicts the oldest entry.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::id::{BannerId, MarketId};

/// Default number of banners kept on display.
pub const DEFAULT_BANNER_CAPACITY: usize = 4;

/// A banner promoting one market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerEntry {
    pub id: BannerId,
    #[serde(rename = "imageUrl")]
    pub image_reference: Url,
    pub market_id: MarketId,
    pub title: String,
}

/// Object name a banner image is stored under: `<prefix><id>.png`.
#[must_use]
pub fn object_name(prefix: &str, id: BannerId) -> String {
    format!("{prefix}{id}.png")
}

/// Recover the banner id from a stored object name.
///
/// Accepts any extension; returns `None` if the name does not carry `prefix`
/// followed by a numeric id.
#[must_use]
pub fn parse_object_name(prefix: &str, name: &str) -> Option<BannerId> {
    let rest = name.strip_prefix(prefix)?;
    let stem = rest.split('.').next()?;
    stem.parse::<i64>().ok().map(BannerId::new)
}

/// Bounded, newest-first banner list.
#[derive(Debug, Clone)]
pub struct BannerDirectory {
    entries: VecDeque<BannerEntry>,
    capacity: usize,
    last_id: Option<BannerId>,
}

impl BannerDirectory {
    /// Create an empty directory holding at most `capacity` entries.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            last_id: None,
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &BannerEntry> {
        self.entries.iter()
    }

    /// Allocate an id from the creation time.
    ///
    /// Ids are strictly increasing even when two banners are created within
    /// the same millisecond.
    pub fn next_id(&mut self, now: DateTime<Utc>) -> BannerId {
        let candidate = now.timestamp_millis();
        let id = match self.last_id {
            Some(last) if last.value() >= candidate => BannerId::new(last.value() + 1),
            _ => BannerId::new(candidate),
        };
        self.last_id = Some(id);
        id
    }

    /// Insert a banner at the front, returning the entry evicted to make room.
    ///
    /// An entry with the same id is replaced in place of being duplicated.
    pub fn insert(&mut self, entry: BannerEntry) -> Option<BannerEntry> {
        self.entries.retain(|e| e.id != entry.id);
        self.bump_last_id(entry.id);
        self.entries.push_front(entry);
        if self.entries.len() > self.capacity {
            self.entries.pop_back()
        } else {
            None
        }
    }

    /// Replace the contents with the newest `capacity` of `entries`.
    pub fn replace_all(&mut self, mut entries: Vec<BannerEntry>) {
        entries.sort_by(|a, b| b.id.cmp(&a.id));
        entries.dedup_by(|a, b| a.id == b.id);
        entries.truncate(self.capacity);
        if let Some(newest) = entries.first() {
            self.bump_last_id(newest.id);
        }
        self.entries = entries.into();
    }

    /// Remove every banner pointing at `market_id`, returning them.
    pub fn remove_market(&mut self, market_id: MarketId) -> Vec<BannerEntry> {
        let (removed, kept): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|e| e.market_id == market_id);
        self.entries = kept.into();
        removed
    }

    fn bump_last_id(&mut self, id: BannerId) {
        if self.last_id.map_or(true, |last| id > last) {
            self.last_id = Some(id);
        }
    }
}

impl Default for BannerDirectory {
    fn default() -> Self {
        Self::new(DEFAULT_BANNER_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(id: i64, market: u64) -> BannerEntry {
        BannerEntry {
            id: BannerId::new(id),
            image_reference: Url::parse(&format!("https://blob.example/banner_{id}.png")).unwrap(),
            market_id: MarketId::new(market),
            title: format!("Banner {id}"),
        }
    }

    #[test]
    fn overflow_evicts_oldest() {
        let mut dir = BannerDirectory::new(4);
        for id in 1..=4 {
            assert!(dir.insert(entry(id, 0)).is_none());
        }
        let evicted = dir.insert(entry(5, 0)).unwrap();
        assert_eq!(evicted.id, BannerId::new(1));
        let ids: Vec<_> = dir.entries().map(|e| e.id.value()).collect();
        assert_eq!(ids, vec![5, 4, 3, 2]);
    }

    #[test]
    fn ids_are_unique_within_a_millisecond() {
        let mut dir = BannerDirectory::default();
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let first = dir.next_id(now);
        let second = dir.next_id(now);
        assert_eq!(first.value(), 1_700_000_000_000);
        assert!(second > first);
    }

    #[test]
    fn replace_all_keeps_newest() {
        let mut dir = BannerDirectory::new(2);
        dir.replace_all(vec![entry(3, 0), entry(9, 1), entry(5, 2)]);
        let ids: Vec<_> = dir.entries().map(|e| e.id.value()).collect();
        assert_eq!(ids, vec![9, 5]);

        let now = Utc.timestamp_millis_opt(1).unwrap();
        assert_eq!(dir.next_id(now).value(), 10);
    }

    #[test]
    fn remove_market_drops_matching_entries() {
        let mut dir = BannerDirectory::new(4);
        dir.insert(entry(1, 7));
        dir.insert(entry(2, 8));
        dir.insert(entry(3, 7));
        let removed = dir.remove_market(MarketId::new(7));
        assert_eq!(removed.len(), 2);
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn object_names_round_trip() {
        let name = object_name("banner_", BannerId::new(1234));
        assert_eq!(name, "banner_1234.png");
        assert_eq!(parse_object_name("banner_", &name), Some(BannerId::new(1234)));
        assert_eq!(parse_object_name("banner_", "other_1.png"), None);
        assert_eq!(parse_object_name("banner_", "banner_x.png"), None);
    }

    #[test]
    fn serializes_with_public_field_names() {
        let json = serde_json::to_value(entry(1, 2)).unwrap();
        assert_eq!(json["imageUrl"], "https://blob.example/banner_1.png");
        assert_eq!(json["marketId"], 2);
    }
}
