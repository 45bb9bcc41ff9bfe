//! Claim orchestrator: collect the winnings of a resolved market.
//!
//! A single remote step, `Eligible -> Claiming -> Claimed`, or
//! `Claiming -> Failed` which may be retried. Once claimed, further attempts
//! are rejected locally without touching the ledger. The user's stakes are
//! read from the ledger before each attempt, so a session that never saw the
//! stake being placed can still claim.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::deadline::Deadline;
use super::position::PositionBook;
use crate::domain::payout::claimable_payout;
use crate::domain::{
    classify, LifecycleState, MarketId, MarketSnapshot, Money, UserId, UserPosition, ValidationError,
};
use crate::error::{Result, StateError};
use crate::port::{LedgerClient, Receipt, RemoteError};

/// Phase of a claim, exposed for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimPhase {
    Eligible,
    Claiming,
    Claimed { receipt: Receipt, amount: Money },
    Failed(RemoteError),
}

impl ClaimPhase {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Eligible => "eligible",
            Self::Claiming => "claiming",
            Self::Claimed { .. } => "claimed",
            Self::Failed(_) => "failed",
        }
    }
}

/// Claim state machine for one user on one market.
pub struct ClaimOrchestrator {
    market_id: MarketId,
    user: UserId,
    ledger: Arc<dyn LedgerClient>,
    positions: Arc<PositionBook>,
    deadline: Deadline,
    phase: Mutex<ClaimPhase>,
}

impl ClaimOrchestrator {
    #[must_use]
    pub fn new(
        market_id: MarketId,
        user: UserId,
        ledger: Arc<dyn LedgerClient>,
        positions: Arc<PositionBook>,
        deadline: Deadline,
    ) -> Self {
        Self {
            market_id,
            user,
            ledger,
            positions,
            deadline,
            phase: Mutex::new(ClaimPhase::Eligible),
        }
    }

    #[must_use]
    pub fn phase(&self) -> ClaimPhase {
        self.phase.lock().clone()
    }

    /// Claim the winnings owed on `snapshot`.
    ///
    /// Eligibility is checked before submitting: the market must be resolved
    /// at `now` and the net payout for the user's winning stake, as recorded
    /// by the ledger, must be positive. On confirmation the local position is
    /// cleared.
    ///
    /// # Errors
    ///
    /// - [`StateError::AlreadyClaimed`] after a confirmed claim, with no remote call
    /// - [`StateError::RemoteCallInFlight`] while a claim is outstanding
    /// - [`ValidationError::NotClaimable`] unless the market is resolved
    /// - a remote error if the position cannot be read
    /// - [`ValidationError::NothingToClaim`] when the payout is zero
    /// - a remote error from the claim itself, leaving it in `Failed` for a retry
    pub async fn claim(
        &self,
        snapshot: &MarketSnapshot,
        now: DateTime<Utc>,
        fee_bps: u32,
    ) -> Result<ClaimPhase> {
        self.ensure_idle(&self.phase.lock())?;
        let state = classify(snapshot, now);
        if state != LifecycleState::Resolved {
            return Err(ValidationError::NotClaimable {
                market_id: self.market_id,
                state,
            }
            .into());
        }

        let position = self.ledger_position().await?;
        let amount = {
            let mut phase = self.phase.lock();
            self.ensure_idle(&phase)?;
            let settlement = claimable_payout(&position, snapshot, fee_bps)?;
            if settlement.net.is_zero() {
                return Err(ValidationError::NothingToClaim(self.market_id).into());
            }
            *phase = ClaimPhase::Claiming;
            settlement.net
        };
        let call = Claiming {
            orchestrator: self,
            armed: true,
        };

        info!(market_id = %self.market_id, user = %self.user, amount = %amount, "Submitting claim");
        let result = self
            .deadline
            .run(async {
                let tx = self.ledger.submit_claim(self.market_id).await?;
                self.ledger.await_confirmation(&tx).await
            })
            .await;
        call.resolved();

        match result {
            Ok(receipt) => {
                self.positions.clear(self.market_id, &self.user);
                info!(
                    market_id = %self.market_id,
                    tx = %receipt.tx,
                    block = receipt.block_number,
                    amount = %amount,
                    "Winnings claimed"
                );
                let claimed = ClaimPhase::Claimed { receipt, amount };
                *self.phase.lock() = claimed.clone();
                Ok(claimed)
            }
            Err(e) => {
                warn!(market_id = %self.market_id, error = %e, "Claim failed");
                *self.phase.lock() = ClaimPhase::Failed(e.clone());
                Err(e.into())
            }
        }
    }

    fn ensure_idle(&self, phase: &ClaimPhase) -> Result<()> {
        match phase {
            ClaimPhase::Claimed { .. } => Err(StateError::AlreadyClaimed {
                market_id: self.market_id,
            }
            .into()),
            ClaimPhase::Claiming => Err(StateError::RemoteCallInFlight.into()),
            ClaimPhase::Eligible | ClaimPhase::Failed(_) => Ok(()),
        }
    }

    /// Read the user's stakes from the ledger and adopt them locally.
    async fn ledger_position(&self) -> Result<UserPosition> {
        let position = self
            .deadline
            .run(self.ledger.read_position(self.market_id, &self.user))
            .await?;
        self.positions.replace(self.market_id, &self.user, position);
        debug!(
            market_id = %self.market_id,
            stake_a = %position.stake_a(),
            stake_b = %position.stake_b(),
            "Position read for claim"
        );
        Ok(position)
    }
}

/// Fails the claim with [`RemoteError::Timeout`] if the future driving it is
/// dropped while the claim is outstanding.
struct Claiming<'a> {
    orchestrator: &'a ClaimOrchestrator,
    armed: bool,
}

impl Claiming<'_> {
    fn resolved(mut self) {
        self.armed = false;
    }
}

impl Drop for Claiming<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(market_id = %self.orchestrator.market_id, "Claim abandoned before it resolved");
            *self.orchestrator.phase.lock() = ClaimPhase::Failed(RemoteError::Timeout);
        }
    }
}

impl std::fmt::Debug for ClaimOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimOrchestrator")
            .field("market_id", &self.market_id)
            .field("user", &self.user)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
