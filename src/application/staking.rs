//! Staking transaction orchestrator.
//!
//! Drives one stake on one market through its remote steps:
//!
//! ```text
//! Idle -> AmountEntry -> AllowanceCheck -+-> ReadyToStake -> Confirming -> Settled
//!                                        |        ^
//!                                        +-> ApprovalRequired -> Approving
//! ```
//!
//! `AllowanceCheck`, `Approving` and `Confirming` are in flight: a remote call
//! is outstanding and every other intent is rejected with
//! [`StateError::RemoteCallInFlight`]. A cancel received meanwhile is queued
//! and applied once the call resolves. A remote failure parks the stake in
//! [`StakePhase::Failed`] with its option and amount intact, so [`retry`]
//! re-runs only the failed step. A call whose future is dropped before it
//! resolves (caller deadline, `select!`, task abort) counts as a
//! [`RemoteError::Timeout`] of that step, or applies a queued cancel.
//!
//! The state lives behind a `parking_lot::Mutex` that is released before
//! every `.await`.
//!
//! [`retry`]: StakingOrchestrator::retry

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{info, warn};

use super::deadline::Deadline;
use super::position::PositionBook;
use crate::domain::{MarketId, Money, StakeOption, UserId, ValidationError};
use crate::error::{Error, Result, StateError};
use crate::port::{LedgerClient, Receipt, RemoteError};

/// How much to approve when the allowance is short.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalMode {
    /// Approve exactly the stake amount.
    #[default]
    Exact,
    /// Approve the maximum amount once.
    Unlimited,
}

/// Construction-time settings shared by every orchestrator of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StakeSettings {
    pub approval_mode: ApprovalMode,
    pub deadline: Deadline,
}

/// The option and amount a stake was started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StakeTicket {
    pub option: StakeOption,
    pub amount: Money,
}

/// Which remote step failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakeFailure {
    AllowanceCheckFailed(RemoteError),
    ApprovalFailed(RemoteError),
    StakeFailed(RemoteError),
}

impl StakeFailure {
    #[must_use]
    pub const fn error(&self) -> &RemoteError {
        match self {
            Self::AllowanceCheckFailed(e) | Self::ApprovalFailed(e) | Self::StakeFailed(e) => e,
        }
    }
}

/// Phase of a staking transaction, exposed for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakePhase {
    Idle,
    AmountEntry,
    AllowanceCheck,
    ApprovalRequired { allowance: Money },
    Approving,
    ReadyToStake,
    Confirming,
    Settled { receipt: Receipt },
    Cancelled,
    Failed(StakeFailure),
}

impl StakePhase {
    /// Stable name used in logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AmountEntry => "amount_entry",
            Self::AllowanceCheck => "allowance_check",
            Self::ApprovalRequired { .. } => "approval_required",
            Self::Approving => "approving",
            Self::ReadyToStake => "ready_to_stake",
            Self::Confirming => "confirming",
            Self::Settled { .. } => "settled",
            Self::Cancelled => "cancelled",
            Self::Failed(_) => "failed",
        }
    }

    /// A remote call is outstanding.
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        matches!(self, Self::AllowanceCheck | Self::Approving | Self::Confirming)
    }

    /// Settled or cancelled; a new stake may start.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled { .. } | Self::Cancelled)
    }
}

/// Result of a cancel intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The stake was dropped; the orchestrator is idle.
    Cancelled,
    /// A remote call is in flight; the cancel applies once it resolves.
    Deferred,
}

#[derive(Debug)]
struct Inner {
    phase: StakePhase,
    ticket: Option<StakeTicket>,
    cancel_requested: bool,
}

impl Inner {
    /// Apply a cancel queued during the call that just resolved.
    fn take_deferred_cancel(&mut self) -> bool {
        if !std::mem::take(&mut self.cancel_requested) {
            return false;
        }
        self.phase = StakePhase::Cancelled;
        self.ticket = None;
        true
    }
}

/// An outstanding remote call of one step.
///
/// Dropping it before [`InFlight::resolved`] means the driving future was
/// abandoned: the queued cancel is applied or the step is failed with
/// [`RemoteError::Timeout`]. The ledger may still execute the call, so a
/// retry after an abandoned stake submission should re-read the position.
struct InFlight<'a> {
    orchestrator: &'a StakingOrchestrator,
    failure: fn(RemoteError) -> StakeFailure,
    armed: bool,
}

impl InFlight<'_> {
    fn resolved(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let market_id = self.orchestrator.market_id;
        let mut inner = self.orchestrator.inner.lock();
        if inner.take_deferred_cancel() {
            info!(market_id = %market_id, "Stake cancelled after abandoned call");
            return;
        }
        warn!(
            market_id = %market_id,
            phase = inner.phase.name(),
            "Remote call abandoned before it resolved"
        );
        inner.phase = StakePhase::Failed((self.failure)(RemoteError::Timeout));
    }
}

/// State machine for one user's stake on one market.
pub struct StakingOrchestrator {
    market_id: MarketId,
    user: UserId,
    ledger: Arc<dyn LedgerClient>,
    positions: Arc<PositionBook>,
    settings: StakeSettings,
    inner: Mutex<Inner>,
}

impl StakingOrchestrator {
    /// Create an idle orchestrator.
    #[must_use]
    pub fn new(
        market_id: MarketId,
        user: UserId,
        ledger: Arc<dyn LedgerClient>,
        positions: Arc<PositionBook>,
        settings: StakeSettings,
    ) -> Self {
        Self {
            market_id,
            user,
            ledger,
            positions,
            settings,
            inner: Mutex::new(Inner {
                phase: StakePhase::Idle,
                ticket: None,
                cancel_requested: false,
            }),
        }
    }

    #[must_use]
    pub const fn market_id(&self) -> MarketId {
        self.market_id
    }

    #[must_use]
    pub const fn user(&self) -> &UserId {
        &self.user
    }

    #[must_use]
    pub fn phase(&self) -> StakePhase {
        self.inner.lock().phase.clone()
    }

    #[must_use]
    pub fn ticket(&self) -> Option<StakeTicket> {
        self.inner.lock().ticket
    }

    /// A stake has been started and has not settled or been cancelled.
    #[must_use]
    pub fn is_active(&self) -> bool {
        let inner = self.inner.lock();
        inner.ticket.is_some() && !inner.phase.is_terminal()
    }

    /// Select option and amount. No remote call is made.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidAmount`] for a zero amount
    /// - [`StateError::RemoteCallInFlight`] or [`StateError::InvalidTransition`]
    ///   once the stake has progressed past amount entry
    pub fn start_stake(&self, option: StakeOption, amount: Money) -> Result<StakePhase> {
        if amount.is_zero() {
            return Err(ValidationError::InvalidAmount { amount }.into());
        }
        let mut inner = self.inner.lock();
        match inner.phase {
            StakePhase::Idle
            | StakePhase::AmountEntry
            | StakePhase::Settled { .. }
            | StakePhase::Cancelled => {}
            ref phase if phase.is_in_flight() => return Err(StateError::RemoteCallInFlight.into()),
            ref phase => {
                return Err(StateError::InvalidTransition {
                    phase: phase.name(),
                    action: "start stake",
                }
                .into())
            }
        }
        inner.ticket = Some(StakeTicket { option, amount });
        inner.phase = StakePhase::AmountEntry;
        info!(
            market_id = %self.market_id,
            user = %self.user,
            option = %option,
            amount = %amount,
            "Stake started"
        );
        Ok(inner.phase.clone())
    }

    /// Read the allowance and decide whether an approval is needed.
    ///
    /// # Errors
    ///
    /// Returns the remote error and parks the stake in
    /// `Failed(AllowanceCheckFailed)` if the read fails.
    pub async fn check_allowance(&self) -> Result<StakePhase> {
        let (ticket, call) = self.begin(
            "check allowance",
            |p| {
                matches!(
                    p,
                    StakePhase::AmountEntry | StakePhase::Failed(StakeFailure::AllowanceCheckFailed(_))
                )
            },
            StakePhase::AllowanceCheck,
            StakeFailure::AllowanceCheckFailed,
        )?;

        let result = self
            .settings
            .deadline
            .run(self.ledger.read_allowance(&self.user))
            .await;
        call.resolved();

        let mut inner = self.inner.lock();
        if inner.take_deferred_cancel() {
            info!(market_id = %self.market_id, "Stake cancelled after allowance check");
            return Ok(StakePhase::Cancelled);
        }
        match result {
            Ok(allowance) if allowance >= ticket.amount => {
                inner.phase = StakePhase::ReadyToStake;
                info!(
                    market_id = %self.market_id,
                    allowance = %allowance,
                    amount = %ticket.amount,
                    "Allowance sufficient, approval skipped"
                );
                Ok(inner.phase.clone())
            }
            Ok(allowance) => {
                inner.phase = StakePhase::ApprovalRequired { allowance };
                info!(
                    market_id = %self.market_id,
                    allowance = %allowance,
                    amount = %ticket.amount,
                    "Approval required"
                );
                Ok(inner.phase.clone())
            }
            Err(e) => {
                warn!(market_id = %self.market_id, error = %e, "Allowance check failed");
                inner.phase = StakePhase::Failed(StakeFailure::AllowanceCheckFailed(e.clone()));
                Err(e.into())
            }
        }
    }

    /// Submit the approval and wait for it to be confirmed.
    ///
    /// Also retries a failed approval without re-checking the allowance.
    ///
    /// # Errors
    ///
    /// Returns the remote error and parks the stake in `Failed(ApprovalFailed)`
    /// if submission or confirmation fails.
    pub async fn confirm_approval(&self) -> Result<StakePhase> {
        let (ticket, call) = self.begin(
            "confirm approval",
            |p| {
                matches!(
                    p,
                    StakePhase::ApprovalRequired { .. }
                        | StakePhase::Failed(StakeFailure::ApprovalFailed(_))
                )
            },
            StakePhase::Approving,
            StakeFailure::ApprovalFailed,
        )?;

        let approve = match self.settings.approval_mode {
            ApprovalMode::Exact => ticket.amount,
            ApprovalMode::Unlimited => Money::MAX,
        };
        info!(market_id = %self.market_id, amount = %approve, "Submitting approval");
        let result = self
            .settings
            .deadline
            .run(async {
                let tx = self.ledger.submit_approval(approve).await?;
                self.ledger.await_confirmation(&tx).await
            })
            .await;
        call.resolved();

        let mut inner = self.inner.lock();
        if inner.take_deferred_cancel() {
            info!(
                market_id = %self.market_id,
                approved = result.is_ok(),
                "Stake cancelled after approval"
            );
            return Ok(StakePhase::Cancelled);
        }
        match result {
            Ok(receipt) => {
                inner.phase = StakePhase::ReadyToStake;
                info!(
                    market_id = %self.market_id,
                    tx = %receipt.tx,
                    block = receipt.block_number,
                    "Approval confirmed"
                );
                Ok(inner.phase.clone())
            }
            Err(e) => {
                warn!(market_id = %self.market_id, error = %e, "Approval failed");
                inner.phase = StakePhase::Failed(StakeFailure::ApprovalFailed(e.clone()));
                Err(e.into())
            }
        }
    }

    /// Submit the stake and wait for it to be confirmed.
    ///
    /// The user position is credited only once the ledger confirms. Also
    /// retries a failed stake submission.
    ///
    /// # Errors
    ///
    /// Returns the remote error and parks the stake in `Failed(StakeFailed)`
    /// if submission or confirmation fails. The position is left untouched.
    pub async fn confirm_stake(&self) -> Result<StakePhase> {
        let (ticket, call) = self.begin(
            "confirm stake",
            |p| {
                matches!(
                    p,
                    StakePhase::ReadyToStake | StakePhase::Failed(StakeFailure::StakeFailed(_))
                )
            },
            StakePhase::Confirming,
            StakeFailure::StakeFailed,
        )?;

        info!(
            market_id = %self.market_id,
            option = %ticket.option,
            amount = %ticket.amount,
            "Submitting stake"
        );
        let result = self
            .settings
            .deadline
            .run(async {
                let tx = self
                    .ledger
                    .submit_stake(self.market_id, ticket.option, ticket.amount)
                    .await?;
                self.ledger.await_confirmation(&tx).await
            })
            .await;
        call.resolved();

        match result {
            Ok(receipt) => {
                let credited =
                    self.positions
                        .credit(self.market_id, &self.user, ticket.option, ticket.amount);
                let mut inner = self.inner.lock();
                if std::mem::take(&mut inner.cancel_requested) {
                    warn!(market_id = %self.market_id, "Cancel ignored, stake already confirmed");
                }
                inner.phase = StakePhase::Settled {
                    receipt: receipt.clone(),
                };
                inner.ticket = None;
                info!(
                    market_id = %self.market_id,
                    tx = %receipt.tx,
                    block = receipt.block_number,
                    option = %ticket.option,
                    amount = %ticket.amount,
                    "Stake settled"
                );
                credited?;
                Ok(inner.phase.clone())
            }
            Err(e) => {
                let mut inner = self.inner.lock();
                if inner.take_deferred_cancel() {
                    info!(market_id = %self.market_id, error = %e, "Stake cancelled after failed submission");
                    return Ok(StakePhase::Cancelled);
                }
                warn!(market_id = %self.market_id, error = %e, "Stake failed");
                inner.phase = StakePhase::Failed(StakeFailure::StakeFailed(e.clone()));
                Err(e.into())
            }
        }
    }

    /// Re-run the remote step that failed.
    ///
    /// # Errors
    ///
    /// [`StateError::InvalidTransition`] unless the stake is in `Failed`, plus
    /// whatever the retried step returns.
    pub async fn retry(&self) -> Result<StakePhase> {
        let phase = self.phase();
        match phase {
            StakePhase::Failed(StakeFailure::AllowanceCheckFailed(_)) => self.check_allowance().await,
            StakePhase::Failed(StakeFailure::ApprovalFailed(_)) => self.confirm_approval().await,
            StakePhase::Failed(StakeFailure::StakeFailed(_)) => self.confirm_stake().await,
            other => Err(StateError::InvalidTransition {
                phase: other.name(),
                action: "retry",
            }
            .into()),
        }
    }

    /// Abandon the stake.
    ///
    /// Outside a remote call the stake is dropped at once and the orchestrator
    /// returns to `Idle`. During a call the cancel is queued.
    ///
    /// # Errors
    ///
    /// [`StateError::InvalidTransition`] once the stake has settled or was
    /// already cancelled.
    pub fn cancel(&self) -> Result<CancelOutcome> {
        let mut inner = self.inner.lock();
        if inner.phase.is_in_flight() {
            inner.cancel_requested = true;
            info!(market_id = %self.market_id, phase = inner.phase.name(), "Cancel deferred until call resolves");
            return Ok(CancelOutcome::Deferred);
        }
        if inner.phase.is_terminal() {
            return Err(StateError::InvalidTransition {
                phase: inner.phase.name(),
                action: "cancel",
            }
            .into());
        }
        inner.phase = StakePhase::Idle;
        inner.ticket = None;
        info!(market_id = %self.market_id, "Stake cancelled");
        Ok(CancelOutcome::Cancelled)
    }

    /// Enter an in-flight phase if the current one allows `action`.
    ///
    /// A drop of the returned guard before it is resolved fails the step
    /// with `failure`.
    fn begin(
        &self,
        action: &'static str,
        allowed: impl Fn(&StakePhase) -> bool,
        in_flight: StakePhase,
        failure: fn(RemoteError) -> StakeFailure,
    ) -> Result<(StakeTicket, InFlight<'_>)> {
        let mut inner = self.inner.lock();
        if inner.phase.is_in_flight() {
            return Err(StateError::RemoteCallInFlight.into());
        }
        let invalid = |phase: &StakePhase| -> Error {
            StateError::InvalidTransition {
                phase: phase.name(),
                action,
            }
            .into()
        };
        if !allowed(&inner.phase) {
            return Err(invalid(&inner.phase));
        }
        let ticket = inner.ticket.ok_or_else(|| invalid(&inner.phase))?;
        inner.phase = in_flight;
        inner.cancel_requested = false;
        Ok((
            ticket,
            InFlight {
                orchestrator: self,
                failure,
                armed: true,
            },
        ))
    }
}

impl std::fmt::Debug for StakingOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StakingOrchestrator")
            .field("market_id", &self.market_id)
            .field("user", &self.user)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::domain::{future_market, usdc};
    use crate::testkit::ledger::{LedgerOp, MemoryLedger};

    struct Fixture {
        ledger: Arc<MemoryLedger>,
        positions: Arc<PositionBook>,
        orchestrator: Arc<StakingOrchestrator>,
        market_id: MarketId,
    }

    fn fixture(settings: StakeSettings) -> Fixture {
        let user = UserId::new("0xA11CE");
        let ledger = Arc::new(MemoryLedger::new(user.clone()));
        ledger.mint(&user, usdc(1_000));
        let market_id = future_market(&ledger);
        let positions = Arc::new(PositionBook::new());
        let orchestrator = Arc::new(StakingOrchestrator::new(
            market_id,
            user,
            ledger.clone(),
            positions.clone(),
            settings,
        ));
        Fixture {
            ledger,
            positions,
            orchestrator,
            market_id,
        }
    }

    fn user() -> UserId {
        UserId::new("0xa11ce")
    }

    #[test]
    fn zero_amount_is_rejected() {
        let f = fixture(StakeSettings::default());
        let err = f.orchestrator.start_stake(StakeOption::A, Money::ZERO).unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::InvalidAmount { .. })));
        assert_eq!(f.orchestrator.phase(), StakePhase::Idle);
    }

    #[tokio::test]
    async fn full_flow_with_approval_credits_position() {
        let f = fixture(StakeSettings::default());
        let o = &f.orchestrator;
        o.start_stake(StakeOption::A, usdc(10)).unwrap();
        assert_eq!(
            o.check_allowance().await.unwrap(),
            StakePhase::ApprovalRequired { allowance: Money::ZERO }
        );
        assert_eq!(o.confirm_approval().await.unwrap(), StakePhase::ReadyToStake);
        assert_eq!(f.ledger.allowance(&user()), usdc(10));

        let phase = o.confirm_stake().await.unwrap();
        assert!(matches!(phase, StakePhase::Settled { .. }));
        assert_eq!(f.positions.get(f.market_id, &user()).stake_a(), usdc(10));
        assert!(!o.is_active());
    }

    #[tokio::test]
    async fn sufficient_allowance_skips_approval() {
        let f = fixture(StakeSettings::default());
        f.ledger.set_allowance(&user(), usdc(50));
        f.orchestrator.start_stake(StakeOption::B, usdc(20)).unwrap();
        assert_eq!(f.orchestrator.check_allowance().await.unwrap(), StakePhase::ReadyToStake);
        assert_eq!(f.ledger.calls(LedgerOp::SubmitApproval), 0);
    }

    #[tokio::test]
    async fn unlimited_mode_approves_maximum() {
        let f = fixture(StakeSettings {
            approval_mode: ApprovalMode::Unlimited,
            ..StakeSettings::default()
        });
        f.orchestrator.start_stake(StakeOption::A, usdc(1)).unwrap();
        f.orchestrator.check_allowance().await.unwrap();
        f.orchestrator.confirm_approval().await.unwrap();
        assert_eq!(f.ledger.allowance(&user()), Money::MAX);
    }

    #[tokio::test]
    async fn failed_approval_retries_without_allowance_check() {
        let f = fixture(StakeSettings::default());
        let o = &f.orchestrator;
        o.start_stake(StakeOption::A, usdc(5)).unwrap();
        o.check_allowance().await.unwrap();
        f.ledger
            .fail_next(LedgerOp::SubmitApproval, RemoteError::Rejected("user denied".into()));

        let err = o.confirm_approval().await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(o.phase(), StakePhase::Failed(StakeFailure::ApprovalFailed(_))));
        assert_eq!(f.ledger.allowance(&user()), Money::ZERO);

        assert_eq!(o.retry().await.unwrap(), StakePhase::ReadyToStake);
        assert_eq!(f.ledger.calls(LedgerOp::ReadAllowance), 1);
        assert_eq!(o.ticket(), Some(StakeTicket { option: StakeOption::A, amount: usdc(5) }));
    }

    #[tokio::test]
    async fn failed_stake_never_credits_position() {
        let f = fixture(StakeSettings::default());
        let o = &f.orchestrator;
        f.ledger.set_allowance(&user(), usdc(100));
        o.start_stake(StakeOption::B, usdc(7)).unwrap();
        o.check_allowance().await.unwrap();
        f.ledger
            .fail_next(LedgerOp::SubmitStake, RemoteError::Rejected("execution reverted".into()));

        assert!(o.confirm_stake().await.is_err());
        assert!(matches!(o.phase(), StakePhase::Failed(StakeFailure::StakeFailed(_))));
        assert!(f.positions.get(f.market_id, &user()).is_empty());

        assert!(matches!(o.retry().await.unwrap(), StakePhase::Settled { .. }));
        assert_eq!(f.positions.get(f.market_id, &user()).stake_b(), usdc(7));
    }

    #[tokio::test]
    async fn intents_during_call_are_rejected_and_cancel_is_deferred() {
        let f = fixture(StakeSettings::default());
        f.ledger.set_allowance(&user(), usdc(100));
        let o = f.orchestrator.clone();
        o.start_stake(StakeOption::A, usdc(3)).unwrap();
        o.check_allowance().await.unwrap();

        let gate = f.ledger.hold(LedgerOp::SubmitStake);
        let task = tokio::spawn({
            let o = o.clone();
            async move { o.confirm_stake().await }
        });
        gate.entered().await;

        assert_eq!(o.phase(), StakePhase::Confirming);
        let err = o.confirm_stake().await.unwrap_err();
        assert!(matches!(err, Error::State(StateError::RemoteCallInFlight)));
        assert_eq!(o.cancel().unwrap(), CancelOutcome::Deferred);

        gate.release();
        let phase = task.await.unwrap().unwrap();
        assert!(matches!(phase, StakePhase::Settled { .. }), "confirmed stake cannot be undone");
        assert_eq!(f.positions.get(f.market_id, &user()).stake_a(), usdc(3));
        assert_eq!(f.ledger.calls(LedgerOp::SubmitStake), 1);
    }

    #[tokio::test]
    async fn deferred_cancel_applies_after_approval() {
        let f = fixture(StakeSettings::default());
        let o = f.orchestrator.clone();
        o.start_stake(StakeOption::A, usdc(3)).unwrap();
        o.check_allowance().await.unwrap();

        let gate = f.ledger.hold(LedgerOp::SubmitApproval);
        let task = tokio::spawn({
            let o = o.clone();
            async move { o.confirm_approval().await }
        });
        gate.entered().await;
        assert_eq!(o.cancel().unwrap(), CancelOutcome::Deferred);
        gate.release();

        assert_eq!(task.await.unwrap().unwrap(), StakePhase::Cancelled);
        assert!(o.ticket().is_none());
        assert_eq!(f.ledger.calls(LedgerOp::SubmitStake), 0);
    }

    #[tokio::test]
    async fn deadline_expiry_fails_the_step() {
        let f = fixture(StakeSettings {
            deadline: Deadline::after(std::time::Duration::from_millis(20)),
            ..StakeSettings::default()
        });
        let _gate = f.ledger.hold(LedgerOp::ReadAllowance);
        f.orchestrator.start_stake(StakeOption::A, usdc(1)).unwrap();

        let err = f.orchestrator.check_allowance().await.unwrap_err();
        assert!(matches!(err, Error::Remote(RemoteError::Timeout)));
        assert_eq!(
            f.orchestrator.phase(),
            StakePhase::Failed(StakeFailure::AllowanceCheckFailed(RemoteError::Timeout))
        );
    }

    #[tokio::test]
    async fn abandoned_stake_call_fails_the_step_and_allows_retry() {
        let f = fixture(StakeSettings::default());
        f.ledger.set_allowance(&user(), usdc(100));
        let o = &f.orchestrator;
        o.start_stake(StakeOption::A, usdc(4)).unwrap();
        o.check_allowance().await.unwrap();

        let _gate = f.ledger.hold(LedgerOp::SubmitStake);
        let abandoned =
            tokio::time::timeout(std::time::Duration::from_millis(20), o.confirm_stake()).await;
        assert!(abandoned.is_err());
        assert_eq!(
            o.phase(),
            StakePhase::Failed(StakeFailure::StakeFailed(RemoteError::Timeout))
        );
        assert!(f.positions.get(f.market_id, &user()).is_empty());

        assert!(matches!(o.retry().await.unwrap(), StakePhase::Settled { .. }));
        assert_eq!(f.positions.get(f.market_id, &user()).stake_a(), usdc(4));
    }

    #[tokio::test]
    async fn abandoned_call_applies_queued_cancel() {
        let f = fixture(StakeSettings::default());
        let o = f.orchestrator.clone();
        o.start_stake(StakeOption::B, usdc(2)).unwrap();

        let gate = f.ledger.hold(LedgerOp::ReadAllowance);
        let task = tokio::spawn({
            let o = o.clone();
            async move { o.check_allowance().await }
        });
        gate.entered().await;
        assert_eq!(o.cancel().unwrap(), CancelOutcome::Deferred);
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert_eq!(o.phase(), StakePhase::Cancelled);
        assert!(!o.is_active());
    }

    #[test]
    fn cancel_before_any_call_returns_to_idle() {
        let f = fixture(StakeSettings::default());
        f.orchestrator.start_stake(StakeOption::A, usdc(1)).unwrap();
        assert_eq!(f.orchestrator.cancel().unwrap(), CancelOutcome::Cancelled);
        assert_eq!(f.orchestrator.phase(), StakePhase::Idle);
        assert_eq!(f.ledger.total_calls(), 0);
    }

    #[tokio::test]
    async fn out_of_order_intent_is_invalid() {
        let f = fixture(StakeSettings::default());
        let err = f.orchestrator.confirm_stake().await.unwrap_err();
        assert!(matches!(
            err,
            Error::State(StateError::InvalidTransition { phase: "idle", .. })
        ));
    }
}
