//! In-memory [`LedgerClient`] emulating the market contract and its token.
//!
//! Submissions are recorded as pending transactions and executed when
//! confirmed, so a transaction can still revert at confirmation time, as on
//! chain. Tests can script failures per operation, count calls, and hold a
//! call in flight with a [`CallGate`].

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::domain::payout::{settle, DEFAULT_FEE_BPS};
use crate::domain::{MarketId, Money, Outcome, StakeOption, TxHandle, UserId, UserPosition};
use crate::port::{LedgerClient, MarketSnapshotRaw, Receipt, RemoteError};

/// Remote operations of the ledger port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerOp {
    ReadMarket,
    ReadPosition,
    ReadAllowance,
    SubmitApproval,
    SubmitStake,
    SubmitClaim,
    SubmitCreateMarket,
    SubmitResolve,
    AwaitConfirmation,
    ReadMarketCount,
}

/// Holds the next call of one operation until released.
#[derive(Debug, Default)]
pub struct CallGate {
    entered: Notify,
    release: Notify,
}

impl CallGate {
    /// Wait until the held call has started.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the held call proceed.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[derive(Debug)]
enum PendingTx {
    Approval { amount: Money },
    Stake { market_id: MarketId, option: StakeOption, amount: Money },
    Claim { market_id: MarketId },
    CreateMarket { question: String, option_a: String, option_b: String, duration_secs: u64 },
    Resolve { market_id: MarketId, outcome: Outcome },
}

#[derive(Debug)]
struct MarketRecord {
    raw: MarketSnapshotRaw,
    stakes: HashMap<UserId, UserPosition>,
    claimed: Vec<UserId>,
}

#[derive(Debug, Default)]
struct State {
    markets: Vec<MarketRecord>,
    balances: HashMap<UserId, Money>,
    allowances: HashMap<UserId, Money>,
    pending: HashMap<TxHandle, PendingTx>,
    next_tx: u64,
    block: u64,
    failures: HashMap<LedgerOp, VecDeque<RemoteError>>,
    gates: HashMap<LedgerOp, Arc<CallGate>>,
    calls: HashMap<LedgerOp, usize>,
}

fn revert(reason: &str) -> RemoteError {
    RemoteError::Rejected(reason.to_string())
}

fn unix_seconds(time: DateTime<Utc>) -> u64 {
    u64::try_from(time.timestamp()).unwrap_or(0)
}

impl State {
    fn push_market(&mut self, question: &str, option_a: &str, option_b: &str, end_time: u64) -> MarketId {
        let id = MarketId::new(self.markets.len() as u64);
        self.markets.push(MarketRecord {
            raw: MarketSnapshotRaw {
                question: question.to_string(),
                option_a: option_a.to_string(),
                option_b: option_b.to_string(),
                end_time,
                outcome: Outcome::Unresolved.code(),
                total_option_a_stake: 0,
                total_option_b_stake: 0,
                resolved: false,
            },
            stakes: HashMap::new(),
            claimed: Vec::new(),
        });
        id
    }

    fn resolve(&mut self, market_id: MarketId, outcome: Outcome) -> Result<(), RemoteError> {
        let record = self.market_mut(market_id)?;
        if record.raw.resolved {
            return Err(revert("market already resolved"));
        }
        if outcome == Outcome::Unresolved {
            return Err(revert("invalid outcome"));
        }
        record.raw.outcome = outcome.code();
        record.raw.resolved = true;
        Ok(())
    }

    fn market_mut(&mut self, market_id: MarketId) -> Result<&mut MarketRecord, RemoteError> {
        usize::try_from(market_id.value())
            .ok()
            .and_then(|i| self.markets.get_mut(i))
            .ok_or_else(|| revert("market does not exist"))
    }

    fn record_stake(
        &mut self,
        user: &UserId,
        market_id: MarketId,
        option: StakeOption,
        amount: Money,
    ) -> Result<(), RemoteError> {
        let record = self.market_mut(market_id)?;
        if record.raw.resolved {
            return Err(revert("market already resolved"));
        }
        if amount.is_zero() {
            return Err(revert("amount must be positive"));
        }
        let overflow = |_| revert("arithmetic overflow");
        let position = record.stakes.get(user).copied().unwrap_or_default();
        let position = position.credited(option, amount).map_err(overflow)?;
        let total = match option {
            StakeOption::A => &mut record.raw.total_option_a_stake,
            StakeOption::B => &mut record.raw.total_option_b_stake,
        };
        *total = Money::from_units(*total)
            .checked_add(amount)
            .map_err(overflow)?
            .units();
        record.stakes.insert(user.clone(), position);
        Ok(())
    }
}

/// Emulated contract bound to one signing wallet.
///
/// The signer also owns the contract unless [`MemoryLedger::with_owner`]
/// names someone else.
pub struct MemoryLedger {
    signer: UserId,
    owner: UserId,
    fee_bps: u32,
    state: Mutex<State>,
}

impl MemoryLedger {
    /// Create an empty ledger whose submissions are signed by `signer`.
    pub fn new(signer: UserId) -> Self {
        Self {
            owner: signer.clone(),
            signer,
            fee_bps: DEFAULT_FEE_BPS,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_fee_bps(mut self, fee_bps: u32) -> Self {
        self.fee_bps = fee_bps;
        self
    }

    pub fn with_owner(mut self, owner: UserId) -> Self {
        self.owner = owner;
        self
    }

    pub fn signer(&self) -> &UserId {
        &self.signer
    }

    // -----------------------------------------------------------------------
    // Contract administration
    // -----------------------------------------------------------------------

    /// Create a market and return its id, bypassing ownership and mining.
    pub fn create_market(
        &self,
        question: &str,
        option_a: &str,
        option_b: &str,
        end_time: DateTime<Utc>,
    ) -> MarketId {
        self.state
            .lock()
            .push_market(question, option_a, option_b, unix_seconds(end_time))
    }

    /// Resolve a market to `outcome`, bypassing ownership and the end time.
    pub fn resolve(&self, market_id: MarketId, outcome: Outcome) -> Result<(), RemoteError> {
        self.state.lock().resolve(market_id, outcome)
    }

    pub fn market_count(&self) -> usize {
        self.state.lock().markets.len()
    }

    /// Record a stake by any participant, bypassing the token.
    pub fn stake_as(
        &self,
        user: &UserId,
        market_id: MarketId,
        option: StakeOption,
        amount: Money,
    ) -> Result<(), RemoteError> {
        self.state.lock().record_stake(user, market_id, option, amount)
    }

    // -----------------------------------------------------------------------
    // Token
    // -----------------------------------------------------------------------

    pub fn mint(&self, user: &UserId, amount: Money) {
        let mut state = self.state.lock();
        let balance = state.balances.entry(user.clone()).or_default();
        *balance = balance.checked_add(amount).unwrap_or(Money::MAX);
    }

    pub fn balance(&self, user: &UserId) -> Money {
        self.state.lock().balances.get(user).copied().unwrap_or_default()
    }

    pub fn allowance(&self, user: &UserId) -> Money {
        self.state.lock().allowances.get(user).copied().unwrap_or_default()
    }

    pub fn set_allowance(&self, user: &UserId, amount: Money) {
        self.state.lock().allowances.insert(user.clone(), amount);
    }

    // -----------------------------------------------------------------------
    // Test control
    // -----------------------------------------------------------------------

    /// Fail the next call of `op` with `error`. Failures queue up in order.
    pub fn fail_next(&self, op: LedgerOp, error: RemoteError) {
        self.state
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Hold the next call of `op` until the returned gate is released.
    pub fn hold(&self, op: LedgerOp) -> Arc<CallGate> {
        let gate = Arc::new(CallGate::default());
        self.state.lock().gates.insert(op, Arc::clone(&gate));
        gate
    }

    /// Number of calls made to `op`, including failed and held ones.
    pub fn calls(&self, op: LedgerOp) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().calls.values().sum()
    }

    async fn enter(&self, op: LedgerOp) -> Result<(), RemoteError> {
        let gate = {
            let mut state = self.state.lock();
            *state.calls.entry(op).or_default() += 1;
            state.gates.remove(&op)
        };
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        let mut state = self.state.lock();
        match state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn submit(&self, tx: PendingTx) -> TxHandle {
        let mut state = self.state.lock();
        state.next_tx += 1;
        let handle = TxHandle::new(format!("0x{:064x}", state.next_tx));
        state.pending.insert(handle.clone(), tx);
        handle
    }

    fn execute(&self, state: &mut State, tx: PendingTx) -> Result<(), RemoteError> {
        match tx {
            PendingTx::Approval { amount } => {
                state.allowances.insert(self.signer.clone(), amount);
                Ok(())
            }
            PendingTx::Stake {
                market_id,
                option,
                amount,
            } => {
                let record = state.market_mut(market_id)?;
                if unix_seconds(Utc::now()) >= record.raw.end_time {
                    return Err(revert("market has ended"));
                }
                let allowance = state.allowances.get(&self.signer).copied().unwrap_or_default();
                if allowance < amount {
                    return Err(revert("ERC20: insufficient allowance"));
                }
                let balance = state.balances.get(&self.signer).copied().unwrap_or_default();
                let remaining = balance
                    .checked_sub(amount)
                    .map_err(|_| revert("ERC20: transfer amount exceeds balance"))?;
                state.record_stake(&self.signer, market_id, option, amount)?;
                state.balances.insert(self.signer.clone(), remaining);
                if allowance != Money::MAX {
                    state
                        .allowances
                        .insert(self.signer.clone(), Money::from_units(allowance.units() - amount.units()));
                }
                Ok(())
            }
            PendingTx::Claim { market_id } => {
                let fee_bps = self.fee_bps;
                let signer = self.signer.clone();
                let record = state.market_mut(market_id)?;
                if !record.raw.resolved {
                    return Err(revert("market not resolved yet"));
                }
                if record.claimed.contains(&signer) {
                    return Err(revert("winnings already claimed"));
                }
                let Some(winner) = Outcome::from_code(record.raw.outcome)
                    .ok()
                    .and_then(Outcome::winner)
                else {
                    return Err(revert("invalid outcome"));
                };
                let stake = record.stakes.get(&signer).copied().unwrap_or_default();
                let (winning, losing) = match winner {
                    StakeOption::A => (record.raw.total_option_a_stake, record.raw.total_option_b_stake),
                    StakeOption::B => (record.raw.total_option_b_stake, record.raw.total_option_a_stake),
                };
                if stake.stake(winner).is_zero() {
                    return Err(revert("no winnings to claim"));
                }
                let payout = settle(
                    stake.stake(winner),
                    Money::from_units(winning),
                    Money::from_units(losing),
                    fee_bps,
                )
                .map_err(|e| revert(&e.to_string()))?;
                record.claimed.push(signer.clone());
                record.stakes.remove(&signer);
                let balance = state.balances.entry(signer).or_default();
                *balance = balance
                    .checked_add(payout.net)
                    .map_err(|_| revert("arithmetic overflow"))?;
                Ok(())
            }
            PendingTx::CreateMarket {
                question,
                option_a,
                option_b,
                duration_secs,
            } => {
                if self.signer != self.owner {
                    return Err(revert("Only owner can call this function"));
                }
                let end_time = unix_seconds(Utc::now()).saturating_add(duration_secs);
                state.push_market(&question, &option_a, &option_b, end_time);
                Ok(())
            }
            PendingTx::Resolve { market_id, outcome } => {
                if self.signer != self.owner {
                    return Err(revert("Only owner can call this function"));
                }
                if unix_seconds(Utc::now()) < state.market_mut(market_id)?.raw.end_time {
                    return Err(revert("market has not ended yet"));
                }
                state.resolve(market_id, outcome)
            }
        }
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn read_market(&self, market_id: MarketId) -> Result<MarketSnapshotRaw, RemoteError> {
        self.enter(LedgerOp::ReadMarket).await?;
        let mut state = self.state.lock();
        Ok(state.market_mut(market_id)?.raw.clone())
    }

    async fn read_position(
        &self,
        market_id: MarketId,
        user: &UserId,
    ) -> Result<UserPosition, RemoteError> {
        self.enter(LedgerOp::ReadPosition).await?;
        let mut state = self.state.lock();
        Ok(state
            .market_mut(market_id)?
            .stakes
            .get(user)
            .copied()
            .unwrap_or_default())
    }

    async fn read_allowance(&self, user: &UserId) -> Result<Money, RemoteError> {
        self.enter(LedgerOp::ReadAllowance).await?;
        Ok(self.allowance(user))
    }

    async fn submit_approval(&self, amount: Money) -> Result<TxHandle, RemoteError> {
        self.enter(LedgerOp::SubmitApproval).await?;
        Ok(self.submit(PendingTx::Approval { amount }))
    }

    async fn submit_stake(
        &self,
        market_id: MarketId,
        option: StakeOption,
        amount: Money,
    ) -> Result<TxHandle, RemoteError> {
        self.enter(LedgerOp::SubmitStake).await?;
        Ok(self.submit(PendingTx::Stake {
            market_id,
            option,
            amount,
        }))
    }

    async fn submit_claim(&self, market_id: MarketId) -> Result<TxHandle, RemoteError> {
        self.enter(LedgerOp::SubmitClaim).await?;
        Ok(self.submit(PendingTx::Claim { market_id }))
    }

    async fn submit_create_market(
        &self,
        question: &str,
        option_a: &str,
        option_b: &str,
        duration_secs: u64,
    ) -> Result<TxHandle, RemoteError> {
        self.enter(LedgerOp::SubmitCreateMarket).await?;
        Ok(self.submit(PendingTx::CreateMarket {
            question: question.to_string(),
            option_a: option_a.to_string(),
            option_b: option_b.to_string(),
            duration_secs,
        }))
    }

    async fn submit_resolve(
        &self,
        market_id: MarketId,
        outcome: Outcome,
    ) -> Result<TxHandle, RemoteError> {
        self.enter(LedgerOp::SubmitResolve).await?;
        Ok(self.submit(PendingTx::Resolve { market_id, outcome }))
    }

    async fn await_confirmation(&self, tx: &TxHandle) -> Result<Receipt, RemoteError> {
        self.enter(LedgerOp::AwaitConfirmation).await?;
        let mut state = self.state.lock();
        let pending = state
            .pending
            .remove(tx)
            .ok_or_else(|| RemoteError::Unavailable(format!("unknown transaction {tx}")))?;
        self.execute(&mut state, pending)?;
        state.block += 1;
        Ok(Receipt {
            tx: tx.clone(),
            block_number: state.block,
        })
    }

    async fn read_market_count(&self) -> Result<u64, RemoteError> {
        self.enter(LedgerOp::ReadMarketCount).await?;
        Ok(self.state.lock().markets.len() as u64)
    }
}
