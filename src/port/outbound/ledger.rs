//! Ledger port for reading market state and submitting transactions.
//!
//! The ledger (a smart contract plus its stake token) is the authoritative
//! source of truth. Everything the core knows about markets, positions and
//! allowances comes through this trait, one method per logical remote
//! operation, each with an explicit result type.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::domain::{
    MarketId, MarketSnapshot, MarketTerms, Money, Outcome, StakeOption, TxHandle, UserId,
    UserPosition, ValidationError,
};

/// Failure of a remote ledger call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The ledger or its RPC endpoint could not be reached.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger refused the transaction (revert, insufficient balance, ...).
    #[error("rejected by ledger: {0}")]
    Rejected(String),

    /// A caller-supplied deadline expired before the call resolved.
    #[error("ledger call timed out")]
    Timeout,
}

/// Market record exactly as the contract returns it.
///
/// `end_time` is in unix seconds; `outcome` uses the contract's codes
/// (`0` unresolved, `1` option A, `2` option B).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshotRaw {
    pub question: String,
    pub option_a: String,
    pub option_b: String,
    pub end_time: u64,
    pub outcome: u8,
    pub total_option_a_stake: u128,
    pub total_option_b_stake: u128,
    pub resolved: bool,
}

impl MarketSnapshotRaw {
    /// Decode into a validated [`MarketSnapshot`].
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for an unknown outcome code, an
    /// unrepresentable end time, or a resolved flag that contradicts the outcome.
    pub fn into_snapshot(self, market_id: MarketId) -> Result<MarketSnapshot, ValidationError> {
        let outcome = Outcome::from_code(self.outcome)?;
        let end_time = i64::try_from(self.end_time)
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .ok_or(ValidationError::InvalidEndTime(self.end_time))?;
        MarketSnapshot::try_new(
            market_id,
            MarketTerms {
                question: self.question,
                option_a: self.option_a,
                option_b: self.option_b,
                end_time,
            },
            Money::from_units(self.total_option_a_stake),
            Money::from_units(self.total_option_b_stake),
            outcome,
            self.resolved,
        )
    }
}

/// Confirmation of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// The confirmed transaction.
    pub tx: TxHandle,
    /// Block the transaction was included in.
    pub block_number: u64,
}

/// Port for the remote ledger.
///
/// Submissions are signed by the wallet the implementation is bound to;
/// wallet connection and signing live outside the core.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (`Send + Sync`).
///
/// # Errors
///
/// Reads fail with [`RemoteError::Unavailable`]; submissions fail with
/// [`RemoteError::Rejected`] or [`RemoteError::Unavailable`].
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Read one market.
    async fn read_market(&self, market_id: MarketId) -> Result<MarketSnapshotRaw, RemoteError>;

    /// Read a user's stakes on both options of a market.
    async fn read_position(
        &self,
        market_id: MarketId,
        user: &UserId,
    ) -> Result<UserPosition, RemoteError>;

    /// Read how much the market contract may currently spend on the user's behalf.
    async fn read_allowance(&self, user: &UserId) -> Result<Money, RemoteError>;

    /// Submit an approval letting the market contract spend `amount`.
    async fn submit_approval(&self, amount: Money) -> Result<TxHandle, RemoteError>;

    /// Submit a stake of `amount` on `option`.
    async fn submit_stake(
        &self,
        market_id: MarketId,
        option: StakeOption,
        amount: Money,
    ) -> Result<TxHandle, RemoteError>;

    /// Submit a claim of the winnings of a resolved market.
    async fn submit_claim(&self, market_id: MarketId) -> Result<TxHandle, RemoteError>;

    /// Submit the creation of a market open for `duration_secs` from the
    /// block it is mined in. Reserved to the contract owner.
    async fn submit_create_market(
        &self,
        question: &str,
        option_a: &str,
        option_b: &str,
        duration_secs: u64,
    ) -> Result<TxHandle, RemoteError>;

    /// Submit the resolution of a market. Reserved to the contract owner.
    ///
    /// `outcome` is sent with its ledger code (`1` for A, `2` for B);
    /// [`Outcome::Unresolved`] is never a valid argument.
    async fn submit_resolve(
        &self,
        market_id: MarketId,
        outcome: Outcome,
    ) -> Result<TxHandle, RemoteError>;

    /// Wait until a submitted transaction is confirmed or fails.
    async fn await_confirmation(&self, tx: &TxHandle) -> Result<Receipt, RemoteError>;

    /// Number of markets created so far; ids are `0..count`.
    async fn read_market_count(&self) -> Result<u64, RemoteError>;
}
