use std::sync::Arc;

use truthstake::application::{
    CategoryMap, FlowRegistry, MarketDirectory, MarketSession, PositionBook, SessionSettings,
};
use truthstake::domain::{MarketId, Money, Outcome, StakeOption, UserId};
use truthstake::testkit::domain::{future_market, past_market, usdc};
use truthstake::testkit::ledger::MemoryLedger;

pub const ALICE: &str = "0xa11ce00000000000000000000000000000000001";
pub const BOB: &str = "0xb0b0000000000000000000000000000000000002";

pub fn alice() -> UserId {
    UserId::new(ALICE)
}

pub fn bob() -> UserId {
    UserId::new(BOB)
}

/// A ledger signed by Alice, with a session sharing a fresh directory and book.
pub struct Harness {
    pub ledger: Arc<MemoryLedger>,
    pub directory: Arc<MarketDirectory>,
    pub positions: Arc<PositionBook>,
    pub flows: Arc<FlowRegistry>,
    pub session: MarketSession,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(SessionSettings::default())
    }

    pub fn with_settings(settings: SessionSettings) -> Self {
        let ledger = Arc::new(MemoryLedger::new(alice()));
        ledger.mint(&alice(), usdc(1_000));
        let directory = Arc::new(MarketDirectory::new(CategoryMap::new(vec![
            "Crypto".to_string(),
            "Sports".to_string(),
        ])));
        let positions = Arc::new(PositionBook::new());
        let flows = Arc::new(FlowRegistry::new());
        let session = MarketSession::new(
            alice(),
            ledger.clone(),
            directory.clone(),
            positions.clone(),
            flows.clone(),
            settings,
        );
        Self {
            ledger,
            directory,
            positions,
            flows,
            session,
        }
    }

    /// A session for Alice that shares only the ledger and the directory,
    /// as after a restart of the client.
    pub fn fresh_session(&self) -> MarketSession {
        MarketSession::new(
            alice(),
            self.ledger.clone(),
            self.directory.clone(),
            Arc::new(PositionBook::new()),
            Arc::new(FlowRegistry::new()),
            *self.session.settings(),
        )
    }

    /// An open market with 600 on A and 400 on B from other participants.
    pub async fn open_market(&self) -> MarketId {
        let id = future_market(&self.ledger);
        self.ledger
            .stake_as(&bob(), id, StakeOption::A, usdc(600))
            .expect("seed stake A");
        self.ledger
            .stake_as(&bob(), id, StakeOption::B, usdc(400))
            .expect("seed stake B");
        self.session.refresh(id).await.expect("refresh market");
        id
    }

    /// A closed, unresolved market.
    pub async fn pending_market(&self) -> MarketId {
        let id = past_market(&self.ledger);
        self.session.refresh(id).await.expect("refresh market");
        id
    }

    /// A market where Alice staked `stake` on A, resolved to `outcome`.
    ///
    /// Totals: 500 on A (Alice's stake included), 500 on B.
    pub async fn resolved_market(&self, stake: Money, outcome: Outcome) -> MarketId {
        let id = future_market(&self.ledger);
        self.ledger.set_allowance(&alice(), stake);
        self.session.refresh(id).await.expect("refresh market");
        self.session
            .start_stake(id, StakeOption::A, stake, chrono::Utc::now())
            .expect("start stake");
        self.session.check_allowance(id).await.expect("allowance");
        self.session.confirm_stake(id).await.expect("stake");

        let rest = usdc(500).checked_sub(stake).expect("stake at most 500");
        if !rest.is_zero() {
            self.ledger
                .stake_as(&bob(), id, StakeOption::A, rest)
                .expect("seed stake A");
        }
        self.ledger
            .stake_as(&bob(), id, StakeOption::B, usdc(500))
            .expect("seed stake B");
        self.ledger.resolve(id, outcome).expect("resolve");
        self.session.refresh(id).await.expect("refresh market");
        id
    }
}
