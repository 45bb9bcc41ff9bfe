//! Market session: the presentation boundary of one connected user.
//!
//! Exposes read-only projections (lifecycle, odds, payouts, phases) and
//! accepts intents (`start_stake`, `check_allowance`, `confirm_approval`,
//! `confirm_stake`, `cancel`, `claim`) as the only way to mutate state.
//! Stake and claim state machines live in a [`FlowRegistry`] shared by every
//! session, so at most one stake per (market, user) is in progress no matter
//! how many sessions the same wallet opens.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use super::claim::{ClaimOrchestrator, ClaimPhase};
use super::directory::{MarketDirectory, RefreshReport};
use super::position::PositionBook;
use super::registry::FlowRegistry;
use super::staking::{CancelOutcome, StakePhase, StakeSettings, StakingOrchestrator};
use crate::domain::payout::{self, DEFAULT_FEE_BPS};
use crate::domain::{
    classify, time_remaining, LifecycleState, MarketId, MarketSnapshot, Money, Odds, Settlement, StakeOption,
    UserId, UserPosition, ValidationError,
};
use crate::error::{Result, StateError};
use crate::port::LedgerClient;

/// Explicit settings a session is constructed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub stake: StakeSettings,
    /// Platform fee in basis points, applied to settlements.
    pub fee_bps: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            stake: StakeSettings::default(),
            fee_bps: DEFAULT_FEE_BPS,
        }
    }
}

pub struct MarketSession {
    user: UserId,
    ledger: Arc<dyn LedgerClient>,
    directory: Arc<MarketDirectory>,
    positions: Arc<PositionBook>,
    flows: Arc<FlowRegistry>,
    settings: SessionSettings,
}

impl MarketSession {
    #[must_use]
    pub fn new(
        user: UserId,
        ledger: Arc<dyn LedgerClient>,
        directory: Arc<MarketDirectory>,
        positions: Arc<PositionBook>,
        flows: Arc<FlowRegistry>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            user,
            ledger,
            directory,
            positions,
            flows,
            settings,
        }
    }

    #[must_use]
    pub const fn user(&self) -> &UserId {
        &self.user
    }

    #[must_use]
    pub fn directory(&self) -> &MarketDirectory {
        &self.directory
    }

    #[must_use]
    pub const fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    // ---------------------------------------------------------------------
    // Refresh
    // ---------------------------------------------------------------------

    /// Re-read one market into the directory.
    ///
    /// # Errors
    ///
    /// See [`MarketDirectory::refresh_market`].
    pub async fn refresh(&self, market_id: MarketId) -> Result<Arc<MarketSnapshot>> {
        self.directory.refresh_market(self.ledger.as_ref(), market_id).await
    }

    /// Re-read every market into the directory.
    ///
    /// # Errors
    ///
    /// See [`MarketDirectory::refresh_all`].
    pub async fn refresh_all(&self) -> Result<RefreshReport> {
        self.directory.refresh_all(self.ledger.as_ref()).await
    }

    /// Replace the local position with the ledger's record.
    ///
    /// # Errors
    ///
    /// Returns a remote error if the position cannot be read.
    pub async fn sync_position(&self, market_id: MarketId) -> Result<UserPosition> {
        let position = self.ledger.read_position(market_id, &self.user).await?;
        self.positions.replace(market_id, &self.user, position);
        info!(
            market_id = %market_id,
            stake_a = %position.stake_a(),
            stake_b = %position.stake_b(),
            "Position synced"
        );
        Ok(position)
    }

    // ---------------------------------------------------------------------
    // Projections
    // ---------------------------------------------------------------------

    fn snapshot(&self, market_id: MarketId) -> Result<Arc<MarketSnapshot>> {
        self.directory
            .get(market_id)
            .ok_or_else(|| ValidationError::UnknownMarket(market_id).into())
    }

    /// Lifecycle state of a market at `now`.
    ///
    /// # Errors
    ///
    /// [`ValidationError::UnknownMarket`] if the market was never fetched.
    pub fn lifecycle(&self, market_id: MarketId, now: DateTime<Utc>) -> Result<LifecycleState> {
        let snapshot = self.snapshot(market_id)?;
        Ok(classify(&snapshot, now))
    }

    /// Time left until staking closes, `None` once the end time has passed.
    ///
    /// # Errors
    ///
    /// [`ValidationError::UnknownMarket`] if the market was never fetched.
    pub fn time_remaining(&self, market_id: MarketId, now: DateTime<Utc>) -> Result<Option<Duration>> {
        let snapshot = self.snapshot(market_id)?;
        Ok(time_remaining(&snapshot, now))
    }

    /// Current odds of a market.
    ///
    /// # Errors
    ///
    /// [`ValidationError::UnknownMarket`] if the market was never fetched.
    pub fn odds(&self, market_id: MarketId) -> Result<Odds> {
        let snapshot = self.snapshot(market_id)?;
        Ok(payout::odds(&snapshot))
    }

    /// Estimated payout of staking `amount` on `option` at current totals.
    ///
    /// # Errors
    ///
    /// [`ValidationError::UnknownMarket`] or an arithmetic overflow.
    pub fn projected_payout(&self, market_id: MarketId, option: StakeOption, amount: Money) -> Result<Money> {
        let snapshot = self.snapshot(market_id)?;
        Ok(payout::projected_payout(amount, option, &snapshot)?)
    }

    /// What the user's stake on `option` would collect before fees if it won now.
    ///
    /// # Errors
    ///
    /// [`ValidationError::UnknownMarket`] or an arithmetic overflow.
    pub fn potential_winnings(&self, market_id: MarketId, option: StakeOption) -> Result<Money> {
        let snapshot = self.snapshot(market_id)?;
        Ok(payout::potential_winnings(&self.position(market_id), &snapshot, option)?)
    }

    /// Settlement owed to the user on a resolved market, zero otherwise.
    ///
    /// # Errors
    ///
    /// [`ValidationError::UnknownMarket`] or any error of [`payout::settle`].
    pub fn claimable(&self, market_id: MarketId) -> Result<Settlement> {
        let snapshot = self.snapshot(market_id)?;
        Ok(payout::claimable_payout(
            &self.position(market_id),
            &snapshot,
            self.settings.fee_bps,
        )?)
    }

    #[must_use]
    pub fn position(&self, market_id: MarketId) -> UserPosition {
        self.positions.get(market_id, &self.user)
    }

    /// Phase of the latest stake on a market, if one was ever started.
    #[must_use]
    pub fn stake_phase(&self, market_id: MarketId) -> Option<StakePhase> {
        self.flows.stake(market_id, &self.user).map(|o| o.phase())
    }

    /// Phase of the claim on a market, if one was ever attempted.
    #[must_use]
    pub fn claim_phase(&self, market_id: MarketId) -> Option<ClaimPhase> {
        self.flows.claim(market_id, &self.user).map(|o| o.phase())
    }

    // ---------------------------------------------------------------------
    // Intents
    // ---------------------------------------------------------------------

    /// Begin a stake on an active market. No remote call is made.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::UnknownMarket`] or [`ValidationError::MarketClosed`]
    /// - [`ValidationError::InvalidAmount`] for a zero amount
    /// - [`StateError::AlreadyInProgress`] while another stake on the market
    ///   has neither settled nor been cancelled
    pub fn start_stake(
        &self,
        market_id: MarketId,
        option: StakeOption,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<StakePhase> {
        let snapshot = self.snapshot(market_id)?;
        let state = classify(&snapshot, now);
        if state != LifecycleState::Active {
            return Err(ValidationError::MarketClosed { market_id, state }.into());
        }

        let orchestrator = StakingOrchestrator::new(
            market_id,
            self.user.clone(),
            Arc::clone(&self.ledger),
            Arc::clone(&self.positions),
            self.settings.stake,
        );
        self.flows.start_stake(orchestrator, option, amount)
    }

    /// # Errors
    ///
    /// See [`StakingOrchestrator::check_allowance`].
    pub async fn check_allowance(&self, market_id: MarketId) -> Result<StakePhase> {
        self.stake(market_id)?.check_allowance().await
    }

    /// # Errors
    ///
    /// See [`StakingOrchestrator::confirm_approval`].
    pub async fn confirm_approval(&self, market_id: MarketId) -> Result<StakePhase> {
        self.stake(market_id)?.confirm_approval().await
    }

    /// # Errors
    ///
    /// See [`StakingOrchestrator::confirm_stake`].
    pub async fn confirm_stake(&self, market_id: MarketId) -> Result<StakePhase> {
        self.stake(market_id)?.confirm_stake().await
    }

    /// # Errors
    ///
    /// See [`StakingOrchestrator::retry`].
    pub async fn retry_stake(&self, market_id: MarketId) -> Result<StakePhase> {
        self.stake(market_id)?.retry().await
    }

    /// # Errors
    ///
    /// See [`StakingOrchestrator::cancel`].
    pub fn cancel(&self, market_id: MarketId) -> Result<CancelOutcome> {
        self.stake(market_id)?.cancel()
    }

    /// Claim the winnings of a resolved market.
    ///
    /// The user's stakes are read from the ledger first, so the claim works
    /// from a session that never saw them being placed.
    ///
    /// # Errors
    ///
    /// [`ValidationError::UnknownMarket`] plus the errors of
    /// [`ClaimOrchestrator::claim`].
    pub async fn claim(&self, market_id: MarketId, now: DateTime<Utc>) -> Result<ClaimPhase> {
        let snapshot = self.snapshot(market_id)?;
        let orchestrator = self.flows.claim_or_insert_with(market_id, &self.user, || {
            ClaimOrchestrator::new(
                market_id,
                self.user.clone(),
                Arc::clone(&self.ledger),
                Arc::clone(&self.positions),
                self.settings.stake.deadline,
            )
        });
        orchestrator.claim(&snapshot, now, self.settings.fee_bps).await
    }

    fn stake(&self, market_id: MarketId) -> Result<Arc<StakingOrchestrator>> {
        self.flows
            .stake(market_id, &self.user)
            .ok_or_else(|| StateError::NoActiveStake { market_id }.into())
    }
}

impl std::fmt::Debug for MarketSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketSession")
            .field("user", &self.user)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
