//! Storage layer for the plutus credit ledger.
//!
//! This crate defines the two collaborator contracts the ledger engine relies
//! on, and ships backends for each:
//!
//! - [`Store`] / [`StoreTx`]: durable rows for ledger entries, freezes,
//!   balance summaries, journal records and consumption details, with a
//!   transactional boundary and exclusive row locks.
//!   Backends: [`MemoryStore`], and `RocksStore` (feature `rocksdb-backend`).
//! - [`KvStore`]: the shared cache/lock store with atomic set-if-absent and
//!   TTLs, used for idempotency claims and the balance cache.
//!   Backends: [`MemoryKv`], and `RedisKv` (feature `redis-backend`).
//!
//! # Example
//!
//! ```
//! use chrono::{Duration, Utc};
//! use plutus_core::{Decimal, LedgerEntry, SourceType, UserId};
//! use plutus_store::{MemoryStore, Store, StoreTx};
//!
//! let store = MemoryStore::new();
//! let user_id = UserId::generate();
//! let now = Utc::now();
//!
//! let mut tx = store.begin().unwrap();
//! let entry = LedgerEntry::new(
//!     user_id,
//!     Decimal::from(10),
//!     SourceType::System,
//!     None,
//!     now + Duration::days(1),
//!     now,
//! );
//! tx.insert_ledger_entry(entry).unwrap();
//! tx.commit().unwrap();
//!
//! assert_eq!(store.sum_available_ledger(&user_id, now).unwrap(), Decimal::from(10));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod kv;
pub mod memory;

#[cfg(feature = "rocksdb-backend")]
pub mod keys;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;

#[cfg(feature = "redis-backend")]
pub mod redis_kv;

use std::time::Duration;

use chrono::{DateTime, Utc};
use plutus_core::{
    ConsumptionDetail, Decimal, Freeze, LedgerEntry, LedgerId, SessionId, TransactionRecord,
    UserBalanceSummary, UserId,
};

pub use error::{Result, StoreError};
pub use kv::MemoryKv;
pub use memory::{MemoryStore, MemoryTx};

#[cfg(feature = "rocksdb-backend")]
pub use rocks::{RocksStore, RocksTx};

#[cfg(feature = "redis-backend")]
pub use redis_kv::RedisKv;

/// Persistence contract of the ledger.
///
/// Reads on `Store` see committed data only. Every mutation goes through a
/// [`StoreTx`] obtained from [`Store::begin`].
pub trait Store: Send + Sync {
    /// Transaction handle type.
    type Tx<'a>: StoreTx
    where
        Self: 'a;

    /// Open a transactional boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot start a transaction.
    fn begin(&self) -> Result<Self::Tx<'_>>;

    // =========================================================================
    // Balance aggregates
    // =========================================================================

    /// Σ `remaining_amount` of ACTIVE entries expiring after `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn sum_available_ledger(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Decimal>;

    /// Σ `amount` of ACTIVE freezes expiring after `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn sum_active_freezes(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Decimal>;

    /// Earliest `expires_at` after `now` among the ACTIVE entries and ACTIVE
    /// freezes of `user_id`: the next instant the aggregates change without
    /// a write.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn next_expiry(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>>;

    // =========================================================================
    // Row lookups
    // =========================================================================

    /// Get a ledger entry by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_ledger_entry(&self, id: LedgerId) -> Result<Option<LedgerEntry>>;

    /// All of a user's entries regardless of status, ascending by expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_ledger_entries(&self, user_id: &UserId) -> Result<Vec<LedgerEntry>>;

    /// Get a user's balance summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_summary(&self, user_id: &UserId) -> Result<Option<UserBalanceSummary>>;

    /// Get the freeze of a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_freeze(&self, session_id: &SessionId) -> Result<Option<Freeze>>;

    // =========================================================================
    // Journal
    // =========================================================================

    /// Look up a journal record by its unique transaction id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_transaction(&self, transaction_id: &str) -> Result<Option<TransactionRecord>>;

    /// Journal records whose `source_id` equals `source_id`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_transactions_by_source(&self, source_id: &str) -> Result<Vec<TransactionRecord>>;

    /// A page of a user's journal, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TransactionRecord>>;

    /// Number of journal records of a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn count_transactions_by_user(&self, user_id: &UserId) -> Result<usize>;

    /// Ledger draws made under `transaction_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn consumption_details(&self, transaction_id: &str) -> Result<Vec<ConsumptionDetail>>;
}

/// A unit of work against a [`Store`].
///
/// Writes become visible to other readers only on [`StoreTx::commit`];
/// dropping the handle without committing rolls everything back. `lock_*`
/// methods take exclusive row locks that are held until the transaction
/// ends, waiting for concurrent holders rather than skipping their rows.
pub trait StoreTx {
    /// Lock and return the ACTIVE entries expiring after `now`, ascending by
    /// expiry then id.
    ///
    /// # Errors
    ///
    /// Returns an error if a lock cannot be acquired or the read fails.
    fn lock_available_ledger(
        &mut self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>>;

    /// Σ `amount` of ACTIVE freezes expiring after `now`, including writes
    /// made by this transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn sum_active_freezes(&mut self, user_id: &UserId, now: DateTime<Utc>) -> Result<Decimal>;

    /// Lock and return the freeze of a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be acquired or the read fails.
    fn lock_freeze(&mut self, session_id: &SessionId) -> Result<Option<Freeze>>;

    /// Lock and return a user's summary row.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be acquired or the read fails.
    fn lock_summary(&mut self, user_id: &UserId) -> Result<Option<UserBalanceSummary>>;

    /// Insert a new entry and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn insert_ledger_entry(&mut self, entry: LedgerEntry) -> Result<LedgerEntry>;

    /// Overwrite an existing entry.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the entry does not exist.
    fn update_ledger_entry(&mut self, entry: &LedgerEntry) -> Result<()>;

    /// Insert a new freeze and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the session already has a freeze.
    fn insert_freeze(&mut self, freeze: Freeze) -> Result<Freeze>;

    /// Overwrite an existing freeze.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the freeze does not exist.
    fn update_freeze(&mut self, freeze: &Freeze) -> Result<()>;

    /// Insert or replace a summary row.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn put_summary(&mut self, summary: &UserBalanceSummary) -> Result<()>;

    /// Append a consumption detail.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn insert_consumption_detail(&mut self, detail: &ConsumptionDetail) -> Result<()>;

    /// Append a journal record and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the transaction id already exists.
    fn insert_transaction(&mut self, record: TransactionRecord) -> Result<TransactionRecord>;

    /// Make every write of this transaction durable and visible.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; nothing is persisted then.
    fn commit(self) -> Result<()>;
}

/// Shared cache/lock store contract.
///
/// Implementations must make [`KvStore::set_if_absent`] atomic across all
/// processes sharing the store.
pub trait KvStore: Send + Sync {
    /// Set `key` only if it does not exist. Returns `true` if this call set it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Batched [`KvStore::set_if_absent`] in one round-trip, one result per key.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn set_if_absent_many(&self, keys: &[String], value: &str, ttl: Duration)
        -> Result<Vec<bool>>;

    /// Get the value of `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set `key` unconditionally.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Delete `key` (absent keys are fine).
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn delete(&self, key: &str) -> Result<()>;

    /// Delete all `keys` in one round-trip.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn delete_many(&self, keys: &[String]) -> Result<()>;
}
