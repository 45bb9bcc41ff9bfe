//! Market directory: latest snapshot per market, with lifecycle and category views.
//!
//! A refresh swaps whole `Arc<MarketSnapshot>` values, so readers always see a
//! complete snapshot, never a partially updated one. Filtering is a pure
//! projection over the current mapping and classifies at the caller's `now`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::domain::{classify, LifecycleState, MarketId, MarketSnapshot, ValidationError};
use crate::error::{Error, Result};
use crate::port::LedgerClient;

/// Maximum number of concurrent market reads during a bulk refresh.
const REFRESH_CONCURRENCY: usize = 8;

/// Category catalog and the market → category assignments.
#[derive(Debug, Clone, Default)]
pub struct CategoryMap {
    catalog: Vec<String>,
    assignments: HashMap<MarketId, String>,
}

impl CategoryMap {
    /// Create a map with the allowed labels and no assignments.
    #[must_use]
    pub fn new(catalog: Vec<String>) -> Self {
        Self {
            catalog,
            assignments: HashMap::new(),
        }
    }

    /// Allowed labels, in display order.
    #[must_use]
    pub fn catalog(&self) -> &[String] {
        &self.catalog
    }

    /// Assign `label` to a market.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownCategory`] if `label` is not in the catalog.
    pub fn assign(&mut self, market_id: MarketId, label: &str) -> std::result::Result<(), ValidationError> {
        if !self.catalog.iter().any(|c| c == label) {
            return Err(ValidationError::UnknownCategory(label.to_string()));
        }
        self.assignments.insert(market_id, label.to_string());
        Ok(())
    }

    #[must_use]
    pub fn category_of(&self, market_id: MarketId) -> Option<&str> {
        self.assignments.get(&market_id).map(String::as_str)
    }
}

/// Selection criteria for [`MarketDirectory::filter`].
#[derive(Debug, Clone, Default)]
pub struct MarketFilter {
    /// Keep only markets in this lifecycle state.
    pub state: Option<LifecycleState>,
    /// Keep only markets assigned to this category.
    pub category: Option<String>,
}

impl MarketFilter {
    #[must_use]
    pub fn state(state: LifecycleState) -> Self {
        Self {
            state: Some(state),
            category: None,
        }
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Outcome of a bulk refresh.
#[derive(Debug, Default)]
pub struct RefreshReport {
    /// Markets whose snapshot was replaced.
    pub updated: Vec<MarketId>,
    /// Markets that could not be read; their previous snapshot is kept.
    pub failed: Vec<(MarketId, Error)>,
}

impl RefreshReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Latest snapshot per market.
#[derive(Debug, Default)]
pub struct MarketDirectory {
    markets: RwLock<HashMap<MarketId, Arc<MarketSnapshot>>>,
    categories: RwLock<CategoryMap>,
}

impl MarketDirectory {
    /// Create an empty directory with the given category map.
    #[must_use]
    pub fn new(categories: CategoryMap) -> Self {
        Self {
            markets: RwLock::new(HashMap::new()),
            categories: RwLock::new(categories),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.markets.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markets.read().is_empty()
    }

    /// Latest snapshot of one market.
    #[must_use]
    pub fn get(&self, market_id: MarketId) -> Option<Arc<MarketSnapshot>> {
        self.markets.read().get(&market_id).cloned()
    }

    /// All snapshots ordered by market id.
    #[must_use]
    pub fn snapshots(&self) -> Vec<Arc<MarketSnapshot>> {
        let mut all: Vec<_> = self.markets.read().values().cloned().collect();
        all.sort_by_key(|s| s.market_id());
        all
    }

    /// Replace the snapshot of one market, returning the previous one.
    ///
    /// The ledger is ground truth: a snapshot whose totals shrank while the
    /// market is unresolved is still accepted, but logged.
    pub fn upsert(&self, snapshot: MarketSnapshot) -> Option<Arc<MarketSnapshot>> {
        let market_id = snapshot.market_id();
        let snapshot = Arc::new(snapshot);
        let previous = self.markets.write().insert(market_id, Arc::clone(&snapshot));
        if let Some(prev) = &previous {
            if !snapshot.is_resolved()
                && (snapshot.total_stake_a() < prev.total_stake_a()
                    || snapshot.total_stake_b() < prev.total_stake_b())
            {
                warn!(
                    market_id = %market_id,
                    prev_a = %prev.total_stake_a(),
                    prev_b = %prev.total_stake_b(),
                    new_a = %snapshot.total_stake_a(),
                    new_b = %snapshot.total_stake_b(),
                    "Stake totals decreased on an unresolved market"
                );
            }
        }
        previous
    }

    /// Re-read one market from the ledger.
    ///
    /// # Errors
    ///
    /// Returns a remote error if the read fails or a validation error if the
    /// record is malformed; the previous snapshot is kept in both cases.
    pub async fn refresh_market(
        &self,
        ledger: &dyn LedgerClient,
        market_id: MarketId,
    ) -> Result<Arc<MarketSnapshot>> {
        let raw = ledger.read_market(market_id).await?;
        let snapshot = raw.into_snapshot(market_id)?;
        self.upsert(snapshot);
        debug!(market_id = %market_id, "Market refreshed");
        self.get(market_id)
            .ok_or_else(|| ValidationError::UnknownMarket(market_id).into())
    }

    /// Re-read every market the ledger knows about.
    ///
    /// # Errors
    ///
    /// Returns a remote error only if the market count cannot be read.
    /// Per-market failures are collected in the report.
    pub async fn refresh_all(&self, ledger: &dyn LedgerClient) -> Result<RefreshReport> {
        let count = ledger.read_market_count().await?;
        let results: Vec<(MarketId, Result<MarketSnapshot>)> = stream::iter(0..count)
            .map(|id| async move {
                let market_id = MarketId::new(id);
                let snapshot = match ledger.read_market(market_id).await {
                    Ok(raw) => raw.into_snapshot(market_id).map_err(Error::from),
                    Err(e) => Err(Error::from(e)),
                };
                (market_id, snapshot)
            })
            .buffer_unordered(REFRESH_CONCURRENCY)
            .collect()
            .await;

        let mut report = RefreshReport::default();
        for (market_id, result) in results {
            match result {
                Ok(snapshot) => {
                    self.upsert(snapshot);
                    report.updated.push(market_id);
                }
                Err(e) => {
                    warn!(market_id = %market_id, error = %e, "Failed to refresh market");
                    report.failed.push((market_id, e));
                }
            }
        }
        report.updated.sort_unstable();
        report.failed.sort_by_key(|(id, _)| *id);
        info!(
            count,
            updated = report.updated.len(),
            failed = report.failed.len(),
            "Market directory refreshed"
        );
        Ok(report)
    }

    /// Snapshots matching `filter`, classified at `now`, ordered by id.
    #[must_use]
    pub fn filter(&self, filter: &MarketFilter, now: DateTime<Utc>) -> Vec<Arc<MarketSnapshot>> {
        let categories = self.categories.read();
        self.snapshots()
            .into_iter()
            .filter(|s| filter.state.map_or(true, |state| classify(s, now) == state))
            .filter(|s| {
                filter.category.as_deref().map_or(true, |label| {
                    categories.category_of(s.market_id()) == Some(label)
                })
            })
            .collect()
    }

    /// Snapshots in `state` at `now`.
    #[must_use]
    pub fn by_state(&self, state: LifecycleState, now: DateTime<Utc>) -> Vec<Arc<MarketSnapshot>> {
        self.filter(&MarketFilter::state(state), now)
    }

    /// Snapshots assigned to `category`.
    #[must_use]
    pub fn by_category(&self, category: &str) -> Vec<Arc<MarketSnapshot>> {
        self.filter(&MarketFilter::default().with_category(category), Utc::now())
    }

    /// Snapshots whose question contains `query`, ignoring case.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<Arc<MarketSnapshot>> {
        let needle = query.to_lowercase();
        self.snapshots()
            .into_iter()
            .filter(|s| s.question().to_lowercase().contains(&needle))
            .collect()
    }

    /// Assign a category label to a market.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownCategory`] if the label is not in the catalog.
    pub fn assign_category(&self, market_id: MarketId, label: &str) -> Result<()> {
        self.categories.write().assign(market_id, label)?;
        Ok(())
    }

    /// Category assigned to a market, if any.
    #[must_use]
    pub fn category_of(&self, market_id: MarketId) -> Option<String> {
        self.categories.read().category_of(market_id).map(str::to_string)
    }

    /// Allowed category labels.
    #[must_use]
    pub fn catalog(&self) -> Vec<String> {
        self.categories.read().catalog().to_vec()
    }
}
