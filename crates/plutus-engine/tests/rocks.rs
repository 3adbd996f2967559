//! Engine flows on the RocksDB backend.

#![cfg(feature = "rocksdb-backend")]

use std::sync::Arc;
use std::thread;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use plutus_core::{Decimal, SourceType, UserId};
use plutus_engine::{CreditEngine, DeductRequest, EngineConfig, GrantRequest};
use plutus_store::{MemoryKv, RocksStore};

fn engine(dir: &TempDir) -> CreditEngine<RocksStore> {
    let store = RocksStore::open(dir.path()).expect("Failed to open store");
    CreditEngine::new(
        Arc::new(store),
        Arc::new(MemoryKv::new()),
        EngineConfig::default(),
    )
}

fn grant(user_id: UserId, amount: i64, days: i64, id: &str) -> GrantRequest {
    GrantRequest {
        user_id,
        amount: Decimal::from(amount),
        source_type: SourceType::System,
        source_id: None,
        expires_at: Some(Utc::now() + Duration::days(days)),
        idempotency_id: id.to_string(),
    }
}

fn deduct(user_id: UserId, amount: i64, id: &str) -> DeductRequest {
    DeductRequest {
        user_id,
        amount: Decimal::from(amount),
        source_type: SourceType::Chat,
        source_id: None,
        idempotency_id: id.to_string(),
    }
}

#[test]
fn session_lifecycle_persists() {
    let dir = TempDir::new().unwrap();
    let user_id = UserId::generate();
    let session_id = {
        let engine = engine(&dir);
        engine.grant(grant(user_id, 100, 10, "g")).unwrap();
        let session = engine
            .start_session(user_id, Decimal::from(40), "s")
            .unwrap();
        engine
            .settle_session(&session.session_id, Decimal::from(30))
            .unwrap();
        session.session_id
    };

    let engine = engine(&dir);
    assert_eq!(engine.available_balance(&user_id).unwrap(), Decimal::from(70));
    assert_eq!(
        engine.summary(&user_id).unwrap().unwrap().total_balance,
        Decimal::from(70)
    );
    assert!(engine.get_session(&session_id).unwrap().status.is_terminal());
}

#[test]
fn fifo_across_entries() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let user_id = UserId::generate();
    engine.grant(grant(user_id, 5, 3, "g3")).unwrap();
    engine.grant(grant(user_id, 5, 1, "g1")).unwrap();
    engine.grant(grant(user_id, 5, 2, "g2")).unwrap();

    engine.deduct(deduct(user_id, 7, "d")).unwrap();

    let remaining: Vec<_> = engine
        .ledger_entries(&user_id)
        .unwrap()
        .into_iter()
        .map(|e| e.remaining_amount)
        .collect();
    assert_eq!(
        remaining,
        vec![Decimal::ZERO, Decimal::from(3), Decimal::from(5)]
    );
}

#[test]
fn concurrent_deductions_never_overdraw() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(engine(&dir));
    let user_id = UserId::generate();
    engine.grant(grant(user_id, 30, 1, "g")).unwrap();

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.deduct(deduct(user_id, 10, &format!("d{i}"))))
        })
        .collect();
    let succeeded = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(Result::is_ok)
        .count();

    // Lock timeouts may turn a winner into a storage error, never the reverse.
    assert!((1..=3).contains(&succeeded));
    let spent = Decimal::from(10 * i64::try_from(succeeded).unwrap());
    let left: Decimal = engine
        .ledger_entries(&user_id)
        .unwrap()
        .iter()
        .map(|e| e.remaining_amount)
        .sum();
    assert_eq!(left, Decimal::from(30) - spent);
}

#[test]
fn overlapping_batches_lock_summaries_in_one_order() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(engine(&dir));
    let users: Vec<UserId> = (0..6).map(|_| UserId::generate()).collect();

    let handles: Vec<_> = (0..8)
        .map(|round| {
            let engine = Arc::clone(&engine);
            let mut order = users.clone();
            if round % 2 == 1 {
                order.reverse();
            }
            thread::spawn(move || {
                let items: Vec<_> = order
                    .iter()
                    .map(|u| grant(*u, 1, 5, &format!("batch-{round}-{u}")))
                    .collect();
                engine.grant_batch(&items)
            })
        })
        .collect();
    for handle in handles {
        let result = handle.join().unwrap().unwrap();
        assert_eq!(result.success_count, 6);
    }

    for user_id in &users {
        assert_eq!(
            engine.summary(user_id).unwrap().unwrap().total_balance,
            Decimal::from(8)
        );
    }
}
