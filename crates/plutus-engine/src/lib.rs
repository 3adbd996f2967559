//! Credit ledger and session engine.
//!
//! [`CreditEngine`] composes the storage contract, the cache/lock contract
//! and a clock into the ledger operations:
//!
//! - **Grants** create expiring ledger entries ([`CreditEngine::grant`],
//!   [`CreditEngine::grant_batch`]).
//! - **Deductions** consume entries FIFO by expiry ([`CreditEngine::deduct`]).
//! - **Sessions** hold credit with a freeze and later settle or cancel it
//!   ([`CreditEngine::start_session`], [`CreditEngine::settle_session`],
//!   [`CreditEngine::cancel_session`]).
//! - **Queries** read the balance, sessions and the journal.
//!
//! Every mutating operation is wrapped by the [`IdempotencyGuard`]: a retried
//! request replays its journaled result instead of executing twice.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use chrono::{Duration, Utc};
//! use plutus_core::{Decimal, SourceType, UserId};
//! use plutus_engine::{CreditEngine, DeductRequest, EngineConfig, GrantRequest};
//! use plutus_store::{MemoryKv, MemoryStore};
//!
//! let engine = CreditEngine::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryKv::new()),
//!     EngineConfig::default(),
//! );
//! let user_id = UserId::generate();
//!
//! engine.grant(GrantRequest {
//!     user_id,
//!     amount: Decimal::from(100),
//!     source_type: SourceType::SignUp,
//!     source_id: None,
//!     expires_at: Some(Utc::now() + Duration::days(30)),
//!     idempotency_id: "signup-bonus".into(),
//! }).unwrap();
//!
//! engine.deduct(DeductRequest {
//!     user_id,
//!     amount: Decimal::from(30),
//!     source_type: SourceType::Chat,
//!     source_id: Some("chat-42".into()),
//!     idempotency_id: "chat-42-charge".into(),
//! }).unwrap();
//!
//! assert_eq!(engine.available_balance(&user_id).unwrap(), Decimal::from(70));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod balance;
pub mod batch;
pub mod clock;
pub mod config;
pub mod deduct;
pub mod history;
pub mod idempotency;
pub mod keys;
pub mod ledger;
pub mod operations;
pub mod session;

use std::sync::Arc;

use plutus_core::{Result, TransactionRecord, TransactionType, UserId};
use plutus_store::{KvStore, Store};

pub use balance::BalanceAggregator;
pub use batch::{BatchGrantFailure, BatchGrantResult};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use deduct::DeductRequest;
pub use history::{TransactionPage, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use idempotency::{Claim, IdempotencyGuard};
pub use keys::KeyBuilder;
pub use ledger::GrantRequest;
pub use operations::CreditOperations;
pub use session::SessionStart;

/// The credit ledger engine.
pub struct CreditEngine<S: Store> {
    store: Arc<S>,
    guard: IdempotencyGuard,
    balance: BalanceAggregator,
    keys: KeyBuilder,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl<S: Store> CreditEngine<S> {
    /// Create an engine on the wall clock.
    #[must_use]
    pub fn new(store: Arc<S>, kv: Arc<dyn KvStore>, config: EngineConfig) -> Self {
        Self::with_clock(store, kv, Arc::new(SystemClock), config)
    }

    /// Create an engine with an explicit time source.
    #[must_use]
    pub fn with_clock(
        store: Arc<S>,
        kv: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let keys = KeyBuilder::new(config.key_prefix.clone());
        Self {
            guard: IdempotencyGuard::new(kv.clone(), config.idempotency_ttl()),
            balance: BalanceAggregator::new(kv, keys.clone(), config.balance_cache_ttl()),
            keys,
            store,
            clock,
            config,
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Journal record `transaction_id` if it is a `kind` record of `user_id`.
    fn journaled(
        &self,
        transaction_id: &str,
        user_id: &UserId,
        kind: TransactionType,
    ) -> Result<Option<TransactionRecord>> {
        Ok(self
            .store
            .find_transaction(transaction_id)?
            .filter(|r| r.user_id == *user_id && r.transaction_type == kind))
    }
}
