//! Session lifecycle integration tests.

mod common;

use chrono::Duration;
use common::TestEngine;

use plutus_core::{CreditError, Decimal, FreezeStatus, SessionId, TransactionType};

fn d(v: i64) -> Decimal {
    Decimal::from(v)
}

#[test]
fn start_holds_credit_without_touching_ledger() {
    let t = TestEngine::new();
    t.grant(100, Duration::days(1), "g");

    let session = t.engine.start_session(t.user_id, d(40), "s1").unwrap();
    assert_eq!(session.amount, d(40));
    assert_eq!(session.idempotency_id, "s1");
    assert_eq!(t.balance(), d(60));
    assert_eq!(t.ledger_sum(), d(100));

    let freeze = t.engine.get_session(&session.session_id).unwrap();
    assert_eq!(freeze.status, FreezeStatus::Active);
    assert_eq!(freeze.expires_at, common::start_time() + Duration::days(1));
}

#[test]
fn cancel_releases_the_hold() {
    let t = TestEngine::new();
    t.grant(100, Duration::days(1), "g");
    let session = t.engine.start_session(t.user_id, d(40), "s1").unwrap();

    t.engine.cancel_session(&session.session_id).unwrap();
    assert_eq!(t.balance(), d(100));
    assert_eq!(
        t.engine.get_session(&session.session_id).unwrap().status,
        FreezeStatus::Cancelled
    );

    // Repeated cancel is a no-op.
    t.engine.cancel_session(&session.session_id).unwrap();
    assert_eq!(t.engine.transaction_history(&t.user_id, 0, None).unwrap().total, 3);
}

#[test]
fn settle_consumes_the_final_amount_only() {
    let t = TestEngine::new();
    t.grant(100, Duration::days(1), "g");
    let session = t.engine.start_session(t.user_id, d(40), "s1").unwrap();

    let record = t.engine.settle_session(&session.session_id, d(30)).unwrap();
    assert_eq!(record.transaction_type, TransactionType::Consume);
    assert_eq!(record.amount, d(30));
    assert_eq!(record.source_id, Some(session.session_id.to_string()));

    assert_eq!(t.balance(), d(70));
    assert_eq!(t.ledger_sum(), d(70));
    assert_eq!(t.summary_total(), d(70));
    assert_eq!(
        t.engine.get_session(&session.session_id).unwrap().status,
        FreezeStatus::Consumed
    );
    assert_eq!(
        t.engine
            .consumption_details(&record.transaction_id)
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn repeated_settle_replays_the_first_record() {
    let t = TestEngine::new();
    t.grant(100, Duration::days(1), "g");
    let session = t.engine.start_session(t.user_id, d(40), "s1").unwrap();

    let first = t.engine.settle_session(&session.session_id, d(30)).unwrap();
    let second = t.engine.settle_session(&session.session_id, d(30)).unwrap();
    assert_eq!(first, second);
    assert_eq!(t.ledger_sum(), d(70));
}

#[test]
fn settle_and_cancel_are_mutually_exclusive() {
    let t = TestEngine::new();
    t.grant(100, Duration::days(1), "g");

    let settled = t.engine.start_session(t.user_id, d(10), "s1").unwrap();
    t.engine.settle_session(&settled.session_id, d(10)).unwrap();
    let err = t.engine.cancel_session(&settled.session_id).unwrap_err();
    assert_eq!(err.code(), "INVALID_SESSION_STATUS");

    let cancelled = t.engine.start_session(t.user_id, d(10), "s2").unwrap();
    t.engine.cancel_session(&cancelled.session_id).unwrap();
    let err = t
        .engine
        .settle_session(&cancelled.session_id, d(5))
        .unwrap_err();
    assert!(matches!(
        err,
        CreditError::InvalidSessionStatus {
            status: FreezeStatus::Cancelled,
            ..
        }
    ));
    assert_eq!(t.balance(), d(90));
}

#[test]
fn settle_above_reservation_is_rejected() {
    let t = TestEngine::new();
    t.grant(100, Duration::days(1), "g");
    let session = t.engine.start_session(t.user_id, d(40), "s1").unwrap();

    let err = t
        .engine
        .settle_session(&session.session_id, d(41))
        .unwrap_err();
    assert_eq!(err.code(), "AMOUNT_EXCEEDS_RESERVATION");

    // The rejected attempt left the session settleable.
    t.engine.settle_session(&session.session_id, d(40)).unwrap();
    assert_eq!(t.balance(), d(60));
}

#[test]
fn unknown_session_is_not_found() {
    let t = TestEngine::new();
    let missing = SessionId::generate();

    for err in [
        t.engine.settle_session(&missing, d(1)).unwrap_err(),
        t.engine.cancel_session(&missing).unwrap_err(),
        t.engine.get_session(&missing).unwrap_err(),
    ] {
        assert_eq!(err.code(), "SESSION_NOT_FOUND");
    }
}

#[test]
fn holds_count_against_later_reservations_and_deductions() {
    let t = TestEngine::new();
    t.grant(50, Duration::days(1), "g");
    t.engine.start_session(t.user_id, d(30), "s1").unwrap();

    let err = t.engine.start_session(t.user_id, d(30), "s2").unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_BALANCE");
    let err = t.engine.deduct(t.deduct_request(21, "d")).unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_BALANCE");

    t.engine.deduct(t.deduct_request(20, "d2")).unwrap();
    assert_eq!(t.balance(), Decimal::ZERO);
}

#[test]
fn expired_hold_stops_counting() {
    let t = TestEngine::new();
    t.grant(50, Duration::days(30), "g");
    t.engine.start_session(t.user_id, d(30), "s1").unwrap();

    t.clock.advance(Duration::days(2));
    t.engine.deduct(t.deduct_request(50, "d")).unwrap();
    assert_eq!(t.ledger_sum(), Decimal::ZERO);
}

#[test]
fn cached_balance_follows_hold_expiry() {
    let t = TestEngine::new();
    t.grant(100, Duration::days(30), "g");
    t.engine.start_session(t.user_id, d(100), "s1").unwrap();
    assert_eq!(t.balance(), Decimal::ZERO);

    t.clock.advance(Duration::hours(25));
    assert_eq!(t.balance(), d(100));
    t.engine.deduct(t.deduct_request(10, "after-hold")).unwrap();
    assert_eq!(t.balance(), d(90));
}

#[test]
fn repeated_start_replays_the_same_session() {
    let t = TestEngine::new();
    t.grant(100, Duration::days(1), "g");

    let first = t.engine.start_session(t.user_id, d(40), "s1").unwrap();
    let second = t.engine.start_session(t.user_id, d(40), "s1").unwrap();
    assert_eq!(first, second);
    assert_eq!(t.balance(), d(60));
}

#[test]
fn start_with_non_positive_amount_is_rejected() {
    let t = TestEngine::new();
    t.grant(100, Duration::days(1), "g");
    let err = t.engine.start_session(t.user_id, d(0), "s1").unwrap_err();
    assert_eq!(err.code(), "INVALID_AMOUNT");
}
