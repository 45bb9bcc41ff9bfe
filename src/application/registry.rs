//! Orchestrators shared by every session, keyed by market and wallet.
//!
//! A wallet may open several sessions; they all see the same stake and claim
//! state machines, so at most one stake per (market, user) is ever in
//! progress.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::claim::ClaimOrchestrator;
use super::staking::{StakePhase, StakingOrchestrator};
use crate::domain::{MarketId, Money, StakeOption, UserId};
use crate::error::{Result, StateError};

type FlowKey = (MarketId, UserId);

#[derive(Default)]
pub struct FlowRegistry {
    stakes: Mutex<HashMap<FlowKey, Arc<StakingOrchestrator>>>,
    claims: Mutex<HashMap<FlowKey, Arc<ClaimOrchestrator>>>,
}

impl FlowRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stake(&self, market_id: MarketId, user: &UserId) -> Option<Arc<StakingOrchestrator>> {
        self.stakes.lock().get(&(market_id, user.clone())).cloned()
    }

    #[must_use]
    pub fn claim(&self, market_id: MarketId, user: &UserId) -> Option<Arc<ClaimOrchestrator>> {
        self.claims.lock().get(&(market_id, user.clone())).cloned()
    }

    /// Start `orchestrator` with `option` and `amount` and register it, unless
    /// the same user already has an active stake on the market.
    ///
    /// Nothing is registered when the start is rejected.
    ///
    /// # Errors
    ///
    /// [`StateError::AlreadyInProgress`] while another stake is active, or
    /// whatever [`StakingOrchestrator::start_stake`] returns.
    pub fn start_stake(
        &self,
        orchestrator: StakingOrchestrator,
        option: StakeOption,
        amount: Money,
    ) -> Result<StakePhase> {
        let market_id = orchestrator.market_id();
        let key = (market_id, orchestrator.user().clone());
        let mut stakes = self.stakes.lock();
        if stakes.get(&key).is_some_and(|o| o.is_active()) {
            return Err(StateError::AlreadyInProgress { market_id }.into());
        }
        let phase = orchestrator.start_stake(option, amount)?;
        stakes.insert(key, Arc::new(orchestrator));
        Ok(phase)
    }

    /// The claim orchestrator of a (market, user), created on first use.
    pub fn claim_or_insert_with(
        &self,
        market_id: MarketId,
        user: &UserId,
        create: impl FnOnce() -> ClaimOrchestrator,
    ) -> Arc<ClaimOrchestrator> {
        let mut claims = self.claims.lock();
        Arc::clone(
            claims
                .entry((market_id, user.clone()))
                .or_insert_with(|| Arc::new(create())),
        )
    }
}

impl std::fmt::Debug for FlowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowRegistry")
            .field("stakes", &self.stakes.lock().len())
            .field("claims", &self.claims.lock().len())
            .finish()
    }
}
