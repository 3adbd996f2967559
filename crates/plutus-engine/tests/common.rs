//! Common test utilities for engine integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use plutus_core::{Decimal, SourceType, TransactionRecord, UserId};
use plutus_engine::{CreditEngine, DeductRequest, EngineConfig, GrantRequest, ManualClock};
use plutus_store::{MemoryKv, MemoryStore, Store};

/// Engine on in-memory backends with a controllable clock.
pub struct TestEngine {
    pub engine: Arc<CreditEngine<MemoryStore>>,
    pub kv: Arc<MemoryKv>,
    pub clock: Arc<ManualClock>,
    pub user_id: UserId,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

impl TestEngine {
    pub fn new() -> Self {
        let kv = Arc::new(MemoryKv::new());
        let clock = Arc::new(ManualClock::new(start_time()));
        let engine = CreditEngine::with_clock(
            Arc::new(MemoryStore::new()),
            kv.clone(),
            clock.clone(),
            EngineConfig {
                key_prefix: "test:".into(),
                ..EngineConfig::default()
            },
        );
        Self {
            engine: Arc::new(engine),
            kv,
            clock,
            user_id: UserId::generate(),
        }
    }

    pub fn grant_request(&self, amount: i64, expires_in: Duration, id: &str) -> GrantRequest {
        GrantRequest {
            user_id: self.user_id,
            amount: Decimal::from(amount),
            source_type: SourceType::System,
            source_id: None,
            expires_at: Some(start_time() + expires_in),
            idempotency_id: id.to_string(),
        }
    }

    pub fn grant(&self, amount: i64, expires_in: Duration, id: &str) -> TransactionRecord {
        self.engine
            .grant(self.grant_request(amount, expires_in, id))
            .expect("grant")
    }

    pub fn deduct_request(&self, amount: i64, id: &str) -> DeductRequest {
        DeductRequest {
            user_id: self.user_id,
            amount: Decimal::from(amount),
            source_type: SourceType::Chat,
            source_id: Some(format!("chat-{id}")),
            idempotency_id: id.to_string(),
        }
    }

    pub fn balance(&self) -> Decimal {
        self.engine.available_balance(&self.user_id).unwrap()
    }

    /// Σ `remaining_amount` over all of the user's entries.
    pub fn ledger_sum(&self) -> Decimal {
        self.engine
            .store()
            .list_ledger_entries(&self.user_id)
            .unwrap()
            .iter()
            .map(|e| e.remaining_amount)
            .sum()
    }

    pub fn summary_total(&self) -> Decimal {
        self.engine
            .summary(&self.user_id)
            .unwrap()
            .expect("summary")
            .total_balance
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}
