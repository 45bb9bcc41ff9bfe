mod support;

use chrono::{Duration, Utc};

use support::fixture::{bob, Harness};
use truthstake::application::MarketFilter;
use truthstake::domain::{LifecycleState, MarketId, Outcome, StakeOption, ValidationError};
use truthstake::error::Error;
use truthstake::port::RemoteError;
use truthstake::testkit::domain::{future_market, past_market, usdc};
use truthstake::testkit::ledger::LedgerOp;

#[tokio::test]
async fn refresh_all_loads_every_market() {
    let h = Harness::new();
    let open = future_market(&h.ledger);
    let pending = past_market(&h.ledger);
    let resolved = future_market(&h.ledger);
    h.ledger.resolve(resolved, Outcome::OptionB).unwrap();

    let report = h.session.refresh_all().await.unwrap();
    assert_eq!(report.updated, vec![open, pending, resolved]);
    assert!(report.is_complete());

    let now = Utc::now();
    let ids = |state| -> Vec<MarketId> {
        h.directory
            .by_state(state, now)
            .iter()
            .map(|s| s.market_id())
            .collect()
    };
    assert_eq!(ids(LifecycleState::Active), vec![open]);
    assert_eq!(ids(LifecycleState::Pending), vec![pending]);
    assert_eq!(ids(LifecycleState::Resolved), vec![resolved]);
}

#[tokio::test]
async fn failed_read_keeps_previous_snapshot() {
    let h = Harness::new();
    let market_id = h.open_market().await;
    h.ledger
        .stake_as(&bob(), market_id, StakeOption::A, usdc(1))
        .unwrap();
    h.ledger.fail_next(
        LedgerOp::ReadMarket,
        RemoteError::Unavailable("rpc timeout".into()),
    );

    let report = h.session.refresh_all().await.unwrap();
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].1.is_retryable());
    assert_eq!(
        h.directory.get(market_id).unwrap().total_stake_a(),
        usdc(600),
        "previous snapshot must survive a failed read"
    );

    tokio_test::assert_ok!(h.session.refresh_all().await);
    assert_eq!(h.directory.get(market_id).unwrap().total_stake_a(), usdc(601));
}

#[tokio::test]
async fn unreadable_count_fails_the_refresh() {
    let h = Harness::new();
    h.ledger.fail_next(
        LedgerOp::ReadMarketCount,
        RemoteError::Unavailable("rpc down".into()),
    );
    let err = h.session.refresh_all().await.unwrap_err();
    assert!(matches!(err, Error::Remote(RemoteError::Unavailable(_))));
    assert!(h.directory.is_empty());
}

#[tokio::test]
async fn lifecycle_moves_with_the_clock_alone() {
    let h = Harness::new();
    let market_id = h.open_market().await;
    let end = h.directory.get(market_id).unwrap().end_time();

    assert_eq!(
        h.session.lifecycle(market_id, end - Duration::seconds(1)).unwrap(),
        LifecycleState::Active
    );
    assert_eq!(
        h.session.lifecycle(market_id, end).unwrap(),
        LifecycleState::Pending
    );
    assert_eq!(
        h.session.time_remaining(market_id, end - Duration::minutes(5)).unwrap(),
        Some(Duration::minutes(5))
    );
    assert_eq!(h.session.time_remaining(market_id, end).unwrap(), None);
}

#[tokio::test]
async fn category_and_search_filters() {
    let h = Harness::new();
    let first = h.open_market().await;
    let second = h.pending_market().await;
    h.directory.assign_category(first, "Crypto").unwrap();
    h.directory.assign_category(second, "Sports").unwrap();

    let crypto = h.directory.by_category("Crypto");
    assert_eq!(crypto.len(), 1);
    assert_eq!(crypto[0].market_id(), first);

    let filter = MarketFilter::state(LifecycleState::Pending).with_category("Crypto");
    assert!(h.directory.filter(&filter, Utc::now()).is_empty());

    assert_eq!(h.directory.search("bitcoin").len(), 1);
    assert_eq!(h.directory.search("RAIN")[0].market_id(), second);

    let err = h.directory.assign_category(first, "Weather").unwrap_err();
    assert!(matches!(err, Error::Validation(ValidationError::UnknownCategory(_))));
}

#[tokio::test]
async fn unknown_market_is_reported() {
    let h = Harness::new();
    tokio_test::assert_err!(h.session.lifecycle(MarketId::new(42), Utc::now()));
    let err = h.session.odds(MarketId::new(42)).unwrap_err();
    assert!(matches!(err, Error::Validation(ValidationError::UnknownMarket(_))));

    let err = h.session.refresh(MarketId::new(42)).await.unwrap_err();
    assert!(matches!(err, Error::Remote(RemoteError::Rejected(_))));
}
