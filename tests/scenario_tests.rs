//! End-to-end behaviour through the session boundary.

mod support;

use chrono::Utc;
use rust_decimal_macros::dec;

use support::assertions::{assert_decimal_near, assert_money_eq};
use support::fixture::{alice, Harness};
use truthstake::application::{CancelOutcome, ClaimPhase, StakeFailure, StakePhase};
use truthstake::domain::payout::final_payout;
use truthstake::domain::{LifecycleState, Money, Outcome, StakeOption, ValidationError};
use truthstake::error::{Error, StateError};
use truthstake::port::RemoteError;
use truthstake::testkit::domain::usdc;
use truthstake::testkit::ledger::LedgerOp;

#[tokio::test]
async fn odds_follow_stake_totals() {
    let h = Harness::new();
    let market_id = h.open_market().await;

    let odds = h.session.odds(market_id).unwrap();
    assert_eq!(odds.bps_a(), 6_000);
    assert_eq!(odds.bps_b(), 4_000);
    assert!((odds.pct_a() + odds.pct_b() - 100.0).abs() <= 0.1);
}

#[test]
fn settlement_matches_ledger_arithmetic() {
    let net = final_payout(
        Money::from_units(100_000_000),
        Money::from_units(500_000_000),
        Money::from_units(500_000_000),
        200,
    )
    .unwrap();
    assert_money_eq(net, dec!(196));
}

#[tokio::test]
async fn cancel_before_any_remote_call_leaves_no_trace() {
    let h = Harness::new();
    let market_id = h.open_market().await;
    let calls_before = h.ledger.total_calls();

    h.session
        .start_stake(market_id, StakeOption::A, usdc(10), Utc::now())
        .unwrap();
    assert_eq!(h.session.cancel(market_id).unwrap(), CancelOutcome::Cancelled);

    assert_eq!(h.session.stake_phase(market_id), Some(StakePhase::Idle));
    assert!(h.session.position(market_id).is_empty());
    assert_eq!(h.ledger.total_calls(), calls_before);
}

#[tokio::test]
async fn rejected_stake_is_not_credited_and_market_is_not_claimable() {
    let h = Harness::new();
    let market_id = h.open_market().await;
    h.ledger.set_allowance(&alice(), usdc(100));

    h.session
        .start_stake(market_id, StakeOption::B, usdc(25), Utc::now())
        .unwrap();
    h.session.check_allowance(market_id).await.unwrap();
    h.ledger.fail_next(
        LedgerOp::SubmitStake,
        RemoteError::Rejected("execution reverted".into()),
    );
    let err = h.session.confirm_stake(market_id).await.unwrap_err();
    assert!(matches!(err, Error::Remote(RemoteError::Rejected(_))));

    assert!(matches!(
        h.session.stake_phase(market_id),
        Some(StakePhase::Failed(StakeFailure::StakeFailed(_)))
    ));
    assert!(h.session.position(market_id).is_empty());

    let err = h.session.claim(market_id, Utc::now()).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::NotClaimable {
            state: LifecycleState::Active,
            ..
        })
    ));
    assert_eq!(h.ledger.calls(LedgerOp::SubmitClaim), 0);
}

#[tokio::test]
async fn double_claim_never_reaches_the_ledger() {
    let h = Harness::new();
    let market_id = h.resolved_market(usdc(100), Outcome::OptionA).await;

    let phase = h.session.claim(market_id, Utc::now()).await.unwrap();
    assert!(matches!(phase, ClaimPhase::Claimed { amount, .. } if amount == usdc(196)));
    let calls = h.ledger.total_calls();

    let err = h.session.claim(market_id, Utc::now()).await.unwrap_err();
    assert!(matches!(err, Error::State(StateError::AlreadyClaimed { .. })));
    assert_eq!(h.ledger.total_calls(), calls);
}

#[tokio::test]
async fn claimable_display_matches_collected_amount() {
    let h = Harness::new();
    let market_id = h.resolved_market(usdc(100), Outcome::OptionA).await;
    let before = h.ledger.balance(&alice());

    let settlement = h.session.claimable(market_id).unwrap();
    assert_money_eq(settlement.gross, dec!(200));
    assert_money_eq(settlement.fee, dec!(4));

    h.session.claim(market_id, Utc::now()).await.unwrap();
    let collected = h.ledger.balance(&alice()).checked_sub(before).unwrap();
    assert_eq!(collected, settlement.net);
    assert!(h.session.position(market_id).is_empty());
}

#[tokio::test]
async fn potential_winnings_before_resolution() {
    let h = Harness::new();
    let market_id = h.open_market().await;
    h.ledger.set_allowance(&alice(), usdc(200));
    h.session
        .start_stake(market_id, StakeOption::A, usdc(200), Utc::now())
        .unwrap();
    h.session.check_allowance(market_id).await.unwrap();
    h.session.confirm_stake(market_id).await.unwrap();
    h.session.refresh(market_id).await.unwrap();

    // 200 of 800 on A, losing pool 400: share = 100
    let winnings = h
        .session
        .potential_winnings(market_id, StakeOption::A)
        .unwrap();
    assert_money_eq(winnings, dec!(300));
    let projected = h
        .session
        .projected_payout(market_id, StakeOption::B, usdc(100))
        .unwrap();
    assert_decimal_near(projected.to_decimal().unwrap(), dec!(300), dec!(0.000001));
}

#[tokio::test]
async fn claim_after_restart_uses_the_ledger_position() {
    let h = Harness::new();
    let market_id = h.resolved_market(usdc(100), Outcome::OptionA).await;

    let fresh = h.fresh_session();
    assert!(fresh.position(market_id).is_empty());
    let reads = h.ledger.calls(LedgerOp::ReadPosition);
    let phase = fresh.claim(market_id, Utc::now()).await.unwrap();
    match phase {
        ClaimPhase::Claimed { amount, .. } => assert_money_eq(amount, dec!(196)),
        other => panic!("expected a confirmed claim, got {other:?}"),
    }
    assert_eq!(h.ledger.calls(LedgerOp::ReadPosition), reads + 1);
    assert_eq!(h.ledger.calls(LedgerOp::SubmitClaim), 1);
}
