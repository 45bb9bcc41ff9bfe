//! Market fee and category configuration.

use serde::Deserialize;

use crate::application::CategoryMap;
use crate::domain::payout::DEFAULT_FEE_BPS;
use crate::domain::{MarketId, ValidationError};

/// Market configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// Platform fee in basis points (default: 200, i.e. 2%).
    #[serde(default = "default_fee_bps")]
    pub fee_bps: u32,
    /// Allowed category labels, in display order.
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
    #[serde(default)]
    pub assignments: Vec<CategoryAssignment>,
    /// How long new markets stay open (default: 30 days).
    #[serde(default = "default_market_duration_days")]
    pub market_duration_days: u32,
}

/// One `[[market.assignments]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryAssignment {
    pub market_id: u64,
    pub category: String,
}

const fn default_fee_bps() -> u32 {
    DEFAULT_FEE_BPS
}

const fn default_market_duration_days() -> u32 {
    30
}

fn default_categories() -> Vec<String> {
    [
        "Crypto",
        "Politics",
        "Sports",
        "Technology & AI",
        "Stock Market",
        "Pop Culture",
        "Science",
        "Global News",
        "Business",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            fee_bps: default_fee_bps(),
            categories: default_categories(),
            assignments: Vec::new(),
            market_duration_days: default_market_duration_days(),
        }
    }
}

impl MarketConfig {
    /// Build the category map, rejecting assignments to unknown labels.
    ///
    /// # Errors
    ///
    /// [`ValidationError::UnknownCategory`] for the first assignment whose
    /// label is not in `categories`.
    pub fn category_map(&self) -> Result<CategoryMap, ValidationError> {
        let mut map = CategoryMap::new(self.categories.clone());
        for assignment in &self.assignments {
            map.assign(MarketId::new(assignment.market_id), &assignment.category)?;
        }
        Ok(map)
    }
}
