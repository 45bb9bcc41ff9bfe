//! Owner operations: create and resolve markets.
//!
//! Both are single remote steps reserved to the contract owner. When the
//! owner address is configured, other wallets are rejected locally before any
//! ledger call; the ledger enforces ownership either way.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use super::deadline::Deadline;
use super::directory::MarketDirectory;
use crate::domain::{
    classify, LifecycleState, MarketId, MarketProposal, MarketSnapshot, Outcome, UserId,
    ValidationError,
};
use crate::error::Result;
use crate::port::{LedgerClient, RemoteError};

/// Settings of the owner service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSettings {
    /// Contract owner; `None` leaves the check to the ledger.
    pub owner: Option<UserId>,
    pub deadline: Deadline,
    /// Duration given to proposals built by [`MarketAdmin::proposal`].
    pub market_duration: Duration,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            owner: None,
            deadline: Deadline::NONE,
            market_duration: Duration::seconds(MarketProposal::DEFAULT_DURATION_SECS),
        }
    }
}

pub struct MarketAdmin {
    user: UserId,
    ledger: Arc<dyn LedgerClient>,
    directory: Arc<MarketDirectory>,
    settings: AdminSettings,
}

impl MarketAdmin {
    #[must_use]
    pub fn new(
        user: UserId,
        ledger: Arc<dyn LedgerClient>,
        directory: Arc<MarketDirectory>,
        settings: AdminSettings,
    ) -> Self {
        Self {
            user,
            ledger,
            directory,
            settings,
        }
    }

    /// A proposal with the configured market duration.
    #[must_use]
    pub fn proposal(
        &self,
        question: impl Into<String>,
        option_a: impl Into<String>,
        option_b: impl Into<String>,
    ) -> MarketProposal {
        MarketProposal::new(question, option_a, option_b).with_duration(self.settings.market_duration)
    }

    /// Create a market, load it into the directory and assign its category.
    ///
    /// The new id is taken as the last one after confirmation, so two owner
    /// sessions creating markets at the same moment may observe each other's.
    ///
    /// # Errors
    ///
    /// - a [`ValidationError`] from [`MarketProposal::validate`]
    /// - [`ValidationError::NotOwner`] for a wallet other than the configured owner
    /// - [`ValidationError::UnknownCategory`] for a category outside the catalog
    /// - a remote error from submission, confirmation or the follow-up read
    pub async fn create_market(&self, proposal: MarketProposal) -> Result<Arc<MarketSnapshot>> {
        proposal.validate()?;
        self.ensure_owner()?;
        if let Some(category) = &proposal.category {
            if !self.directory.catalog().contains(category) {
                return Err(ValidationError::UnknownCategory(category.clone()).into());
            }
        }

        info!(
            question = %proposal.question,
            duration_secs = proposal.duration_secs(),
            "Submitting market creation"
        );
        let receipt = self
            .settings
            .deadline
            .run(async {
                let tx = self
                    .ledger
                    .submit_create_market(
                        &proposal.question,
                        &proposal.option_a,
                        &proposal.option_b,
                        proposal.duration_secs(),
                    )
                    .await?;
                self.ledger.await_confirmation(&tx).await
            })
            .await?;

        let count = self.ledger.read_market_count().await?;
        let market_id = count
            .checked_sub(1)
            .map(MarketId::new)
            .ok_or_else(|| RemoteError::Unavailable("no market after creation".into()))?;
        let snapshot = self
            .directory
            .refresh_market(self.ledger.as_ref(), market_id)
            .await?;
        if let Some(category) = &proposal.category {
            self.directory.assign_category(market_id, category)?;
        }
        info!(
            market_id = %market_id,
            tx = %receipt.tx,
            category = proposal.category.as_deref().unwrap_or("-"),
            "Market created"
        );
        Ok(snapshot)
    }

    /// Resolve a market that has ended to `outcome`.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::UnresolvedOutcome`] for [`Outcome::Unresolved`]
    /// - [`ValidationError::NotOwner`] for a wallet other than the configured owner
    /// - [`ValidationError::UnknownMarket`] or [`ValidationError::NotResolvable`]
    ///   unless the market is known and pending at `now`
    /// - a remote error from submission, confirmation or the follow-up read
    pub async fn resolve_market(
        &self,
        market_id: MarketId,
        outcome: Outcome,
        now: DateTime<Utc>,
    ) -> Result<Arc<MarketSnapshot>> {
        if outcome.winner().is_none() {
            return Err(ValidationError::UnresolvedOutcome.into());
        }
        self.ensure_owner()?;
        let snapshot = self
            .directory
            .get(market_id)
            .ok_or(ValidationError::UnknownMarket(market_id))?;
        let state = classify(&snapshot, now);
        if state != LifecycleState::Pending {
            return Err(ValidationError::NotResolvable { market_id, state }.into());
        }

        info!(market_id = %market_id, outcome = outcome.code(), "Submitting resolution");
        let receipt = self
            .settings
            .deadline
            .run(async {
                let tx = self.ledger.submit_resolve(market_id, outcome).await?;
                self.ledger.await_confirmation(&tx).await
            })
            .await?;
        let snapshot = self
            .directory
            .refresh_market(self.ledger.as_ref(), market_id)
            .await?;
        info!(market_id = %market_id, tx = %receipt.tx, "Market resolved");
        Ok(snapshot)
    }

    fn ensure_owner(&self) -> Result<()> {
        match &self.settings.owner {
            Some(owner) if *owner != self.user => {
                Err(ValidationError::NotOwner(self.user.clone()).into())
            }
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for MarketAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketAdmin")
            .field("user", &self.user)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
