//! Grant, deduction and balance integration tests.

mod common;

use std::sync::Arc;
use std::thread;

use chrono::Duration;
use common::TestEngine;

use plutus_core::{CreditError, Decimal, LedgerStatus, TransactionType};
use plutus_store::{KvStore, Store};

// ============================================================================
// FIFO consumption
// ============================================================================

#[test]
fn deduction_drains_earliest_expiry_first() {
    let t = TestEngine::new();
    let e3 = t.grant(5, Duration::days(3), "g3");
    let e1 = t.grant(5, Duration::days(1), "g1");
    let e2 = t.grant(5, Duration::days(2), "g2");

    let record = t.engine.deduct(t.deduct_request(7, "d1")).unwrap();
    assert_eq!(record.transaction_type, TransactionType::Consume);

    let remaining = |record: &plutus_core::TransactionRecord| {
        t.engine
            .store()
            .get_ledger_entry(record.ledger_entry_id.unwrap())
            .unwrap()
            .unwrap()
    };
    let first = remaining(&e1);
    assert_eq!(first.remaining_amount, Decimal::ZERO);
    assert_eq!(first.status, LedgerStatus::Consumed);
    assert_eq!(remaining(&e2).remaining_amount, Decimal::from(3));
    assert_eq!(remaining(&e3).remaining_amount, Decimal::from(5));

    let details = t.engine.consumption_details("d1").unwrap();
    assert_eq!(details.len(), 2);
    assert_eq!(details[0].ledger_id, e1.ledger_entry_id.unwrap());
    assert_eq!(details[1].amount, Decimal::from(2));
    assert_eq!(t.balance(), Decimal::from(8));
}

#[test]
fn expired_entries_are_neither_counted_nor_consumed() {
    let t = TestEngine::new();
    let short = t.grant(10, Duration::hours(1), "short");
    t.grant(4, Duration::days(10), "long");
    assert_eq!(t.balance(), Decimal::from(14));

    t.clock.advance(Duration::hours(2));
    assert_eq!(t.balance(), Decimal::from(4));

    let err = t.engine.deduct(t.deduct_request(5, "too-much")).unwrap_err();
    assert!(matches!(err, CreditError::InsufficientBalance { .. }));

    t.engine.deduct(t.deduct_request(4, "ok")).unwrap();
    let expired = t
        .engine
        .store()
        .get_ledger_entry(short.ledger_entry_id.unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(expired.remaining_amount, Decimal::from(10));
}

#[test]
fn cached_balance_drops_lapsed_entry_without_a_write() {
    let t = TestEngine::new();
    t.grant(10, Duration::hours(1), "g");
    assert_eq!(t.balance(), Decimal::from(10));

    t.clock.advance(Duration::hours(2));
    assert_eq!(t.balance(), Decimal::ZERO);
    assert_eq!(t.ledger_sum(), Decimal::from(10));
}

#[test]
fn stale_cached_shortfall_does_not_reject_a_deduction() {
    let t = TestEngine::new();
    t.grant(10, Duration::days(1), "g");
    let key = format!("test:user_balance:{}", t.user_id);
    let far = (common::start_time() + Duration::days(1)).timestamp_millis();
    t.kv
        .set(&key, &format!("0|{far}"), std::time::Duration::from_secs(60))
        .unwrap();

    t.engine.deduct(t.deduct_request(3, "d")).unwrap();
    assert_eq!(t.balance(), Decimal::from(7));
}

#[test]
fn insufficient_balance_writes_nothing() {
    let t = TestEngine::new();
    t.grant(5, Duration::days(1), "g");

    let err = t.engine.deduct(t.deduct_request(6, "d")).unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_BALANCE");
    assert_eq!(t.ledger_sum(), Decimal::from(5));
    assert!(t.engine.find_transaction("d").unwrap().is_none());
}

#[test]
fn deduct_without_any_grant_is_insufficient() {
    let t = TestEngine::new();
    let err = t.engine.deduct(t.deduct_request(1, "d")).unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_BALANCE");
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn invalid_grant_releases_key_for_a_corrected_retry() {
    let t = TestEngine::new();
    let mut request = t.grant_request(0, Duration::days(1), "g");
    let err = t.engine.grant(request.clone()).unwrap_err();
    assert_eq!(err.code(), "INVALID_AMOUNT");

    request.amount = Decimal::from(3);
    request.expires_at = Some(common::start_time() - Duration::seconds(1));
    let err = t.engine.grant(request.clone()).unwrap_err();
    assert_eq!(err.code(), "INVALID_EXPIRATION");

    request.expires_at = Some(common::start_time() + Duration::days(1));
    t.engine.grant(request).unwrap();
    assert_eq!(t.balance(), Decimal::from(3));
}

#[test]
fn negative_deduction_is_rejected() {
    let t = TestEngine::new();
    t.grant(5, Duration::days(1), "g");
    let err = t.engine.deduct(t.deduct_request(-1, "d")).unwrap_err();
    assert_eq!(err.code(), "INVALID_AMOUNT");
}

// ============================================================================
// Idempotency
// ============================================================================

#[test]
fn repeated_grant_replays_the_same_record() {
    let t = TestEngine::new();
    let first = t.grant(10, Duration::days(1), "g");
    let second = t.grant(10, Duration::days(1), "g");

    assert_eq!(first, second);
    assert_eq!(t.engine.store().list_ledger_entries(&t.user_id).unwrap().len(), 1);
    assert_eq!(t.balance(), Decimal::from(10));
}

#[test]
fn repeated_deduct_replays_the_same_record() {
    let t = TestEngine::new();
    t.grant(10, Duration::days(1), "g");
    let first = t.engine.deduct(t.deduct_request(4, "d")).unwrap();
    let second = t.engine.deduct(t.deduct_request(4, "d")).unwrap();

    assert_eq!(first, second);
    assert_eq!(t.balance(), Decimal::from(6));
}

#[test]
fn claimed_key_without_journal_is_a_duplicate() {
    let t = TestEngine::new();
    let key = format!("test:credit:grant:{}:g", t.user_id);
    t.kv
        .set_if_absent(&key, "1", std::time::Duration::from_secs(60))
        .unwrap();

    let err = t
        .engine
        .grant(t.grant_request(10, Duration::days(1), "g"))
        .unwrap_err();
    assert_eq!(err.code(), "DUPLICATE_REQUEST");
}

#[test]
fn concurrent_identical_deductions_consume_once() {
    let t = TestEngine::new();
    t.grant(100, Duration::days(1), "g");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&t.engine);
            let request = t.deduct_request(10, "same");
            thread::spawn(move || engine.deduct(request))
        })
        .collect();

    let mut ok = Vec::new();
    for handle in handles {
        match handle.join().unwrap() {
            Ok(record) => ok.push(record),
            Err(err) => assert_eq!(err.code(), "DUPLICATE_REQUEST"),
        }
    }

    assert!(!ok.is_empty());
    assert!(ok.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(t.balance(), Decimal::from(90));
    assert_eq!(t.engine.transaction_history(&t.user_id, 0, None).unwrap().total, 2);
}

#[test]
fn concurrent_distinct_deductions_never_overdraw() {
    let t = TestEngine::new();
    t.grant(50, Duration::days(1), "g");

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let engine = Arc::clone(&t.engine);
            let request = t.deduct_request(10, &format!("d{i}"));
            thread::spawn(move || engine.deduct(request))
        })
        .collect();

    let succeeded = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(Result::is_ok)
        .count();

    assert_eq!(succeeded, 5);
    assert_eq!(t.ledger_sum(), Decimal::ZERO);
}

// ============================================================================
// Summary and history
// ============================================================================

#[test]
fn summary_tracks_ledger_total() {
    let t = TestEngine::new();
    t.grant(10, Duration::days(1), "g1");
    t.grant(15, Duration::days(2), "g2");
    t.engine.deduct(t.deduct_request(12, "d1")).unwrap();
    assert_eq!(t.summary_total(), t.ledger_sum());
    assert_eq!(t.summary_total(), Decimal::from(13));
}

#[test]
fn history_is_paginated_newest_first() {
    let t = TestEngine::new();
    for i in 0..5 {
        t.grant(1, Duration::days(1), &format!("g{i}"));
    }

    let page = t.engine.transaction_history(&t.user_id, 0, Some(2)).unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.size, 2);
    assert_eq!(page.transactions[0].transaction_id, "g4");
    assert_eq!(page.transactions[1].transaction_id, "g3");

    let last = t.engine.transaction_history(&t.user_id, 2, Some(2)).unwrap();
    assert_eq!(last.transactions.len(), 1);
    assert_eq!(last.transactions[0].transaction_id, "g0");

    let clamped = t.engine.transaction_history(&t.user_id, 0, Some(1000)).unwrap();
    assert_eq!(clamped.size, plutus_engine::MAX_PAGE_SIZE);
}
