//! `RocksDB` storage implementation.
//!
//! Built on a pessimistic `TransactionDB`: `lock_*` reads use
//! `get_for_update`, so concurrent transactions touching the same rows wait
//! for each other (up to the configured lock timeout) instead of racing.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, Direction, ErrorKind, IteratorMode, MultiThreaded,
    Options, Transaction, TransactionDB, TransactionDBOptions,
};

use plutus_core::{
    ConsumptionDetail, Decimal, Freeze, LedgerEntry, LedgerId, SessionId, TransactionRecord,
    UserBalanceSummary, UserId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{Store, StoreTx};

type Db = TransactionDB<MultiThreaded>;

fn db_err(err: rocksdb::Error) -> StoreError {
    match err.kind() {
        ErrorKind::Busy | ErrorKind::TimedOut | ErrorKind::TryAgain => {
            StoreError::LockTimeout(err.to_string())
        }
        _ => StoreError::Database(err.to_string()),
    }
}

/// Serialize a value using CBOR.
fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

/// Deserialize a value from CBOR.
fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
    ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<Db>,
    last_id: AtomicI64,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = Db::open_cf_descriptors(
            &opts,
            &TransactionDBOptions::default(),
            path,
            cf_descriptors,
        )
        .map_err(db_err)?;

        let store = Self {
            db: Arc::new(db),
            last_id: AtomicI64::new(0),
        };
        let seed = store.highest_id()?;
        store.last_id.store(seed, Ordering::SeqCst);
        tracing::debug!(last_id = seed, "opened rocksdb store");
        Ok(store)
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    fn next_id(&self) -> i64 {
        self.last_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Highest row id handed out by a previous process.
    fn highest_id(&self) -> Result<i64> {
        let mut highest = 0;
        for name in [cf::LEDGER_ENTRIES, cf::TRANSACTIONS] {
            let cf = self.cf(name)?;
            if let Some(item) = self.db.iterator_cf(&cf, IteratorMode::End).next() {
                let (key, _) = item.map_err(db_err)?;
                highest = highest.max(keys::trailing_id(&key).unwrap_or(0));
            }
        }
        let freezes = self.cf(cf::FREEZES)?;
        for item in self.db.iterator_cf(&freezes, IteratorMode::Start) {
            let (_, value) = item.map_err(db_err)?;
            let freeze: Freeze = deserialize(&value)?;
            highest = highest.max(freeze.id);
        }
        Ok(highest)
    }

    fn get<T: serde::de::DeserializeOwned>(&self, name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(db_err)?
            .map(|data| deserialize(&data))
            .transpose()
    }

    /// Keys of `name` starting with `prefix`, in key order.
    fn prefix_keys(&self, name: &str, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let cf = self.cf(name)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));
        let mut out = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(db_err)?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push(key.to_vec());
        }
        Ok(out)
    }

    /// ACTIVE freezes of `user_id` expiring after `now`.
    fn holding_freezes(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Vec<Freeze>> {
        let mut freezes = Vec::new();
        for key in self.prefix_keys(cf::FREEZES_BY_USER, &keys::user_key(user_id))? {
            let Some(session_id) = keys::session_from_freeze_key(&key) else {
                continue;
            };
            if let Some(freeze) = self.get_freeze(&session_id)? {
                if freeze.is_holding(now) {
                    freezes.push(freeze);
                }
            }
        }
        Ok(freezes)
    }

    fn records_by_ids(&self, index_keys: &[Vec<u8>]) -> Result<Vec<TransactionRecord>> {
        let mut records = Vec::with_capacity(index_keys.len());
        for key in index_keys {
            if let Some(id) = keys::trailing_id(key) {
                if let Some(record) = self.get(cf::TRANSACTIONS, &keys::id_key(id))? {
                    records.push(record);
                }
            }
        }
        Ok(records)
    }
}

impl Store for RocksStore {
    type Tx<'a> = RocksTx<'a>
    where
        Self: 'a;

    fn begin(&self) -> Result<RocksTx<'_>> {
        Ok(RocksTx {
            store: self,
            txn: self.db.transaction(),
        })
    }

    // =========================================================================
    // Balance aggregates
    // =========================================================================

    fn sum_available_ledger(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Decimal> {
        Ok(self
            .list_ledger_entries(user_id)?
            .iter()
            .filter(|e| e.is_available(now))
            .map(|e| e.remaining_amount)
            .sum())
    }

    fn sum_active_freezes(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Decimal> {
        Ok(self
            .holding_freezes(user_id, now)?
            .iter()
            .map(|f| f.amount)
            .sum())
    }

    fn next_expiry(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        // Index keys order entries by expiry, so the first live one is earliest.
        let ledger = self
            .list_ledger_entries(user_id)?
            .into_iter()
            .find(|e| e.is_available(now))
            .map(|e| e.expires_at);
        let freezes = self
            .holding_freezes(user_id, now)?
            .iter()
            .map(|f| f.expires_at)
            .min();
        Ok(ledger.into_iter().chain(freezes).min())
    }

    // =========================================================================
    // Row lookups
    // =========================================================================

    fn get_ledger_entry(&self, id: LedgerId) -> Result<Option<LedgerEntry>> {
        self.get(cf::LEDGER_ENTRIES, &keys::id_key(id))
    }

    fn list_ledger_entries(&self, user_id: &UserId) -> Result<Vec<LedgerEntry>> {
        let mut entries = Vec::new();
        for key in self.prefix_keys(cf::LEDGER_BY_USER, &keys::user_key(user_id))? {
            if let Some(id) = keys::trailing_id(&key) {
                if let Some(entry) = self.get_ledger_entry(id)? {
                    entries.push(entry);
                }
            }
        }
        Ok(entries)
    }

    fn get_summary(&self, user_id: &UserId) -> Result<Option<UserBalanceSummary>> {
        self.get(cf::SUMMARIES, &keys::user_key(user_id))
    }

    fn get_freeze(&self, session_id: &SessionId) -> Result<Option<Freeze>> {
        self.get(cf::FREEZES, &keys::freeze_key(session_id))
    }

    // =========================================================================
    // Journal
    // =========================================================================

    fn find_transaction(&self, transaction_id: &str) -> Result<Option<TransactionRecord>> {
        let cf = self.cf(cf::TRANSACTIONS_BY_TXID)?;
        let Some(id) = self
            .db
            .get_cf(&cf, transaction_id.as_bytes())
            .map_err(db_err)?
        else {
            return Ok(None);
        };
        self.get(cf::TRANSACTIONS, &id)
    }

    fn find_transactions_by_source(&self, source_id: &str) -> Result<Vec<TransactionRecord>> {
        let index = self.prefix_keys(cf::TRANSACTIONS_BY_SOURCE, &keys::string_prefix(source_id))?;
        self.records_by_ids(&index)
    }

    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TransactionRecord>> {
        let mut index = self.prefix_keys(cf::TRANSACTIONS_BY_USER, &keys::user_key(user_id))?;
        // Record ids grow with insertion order; reverse for newest first.
        index.reverse();
        let page: Vec<_> = index.into_iter().skip(offset).take(limit).collect();
        self.records_by_ids(&page)
    }

    fn count_transactions_by_user(&self, user_id: &UserId) -> Result<usize> {
        Ok(self
            .prefix_keys(cf::TRANSACTIONS_BY_USER, &keys::user_key(user_id))?
            .len())
    }

    fn consumption_details(&self, transaction_id: &str) -> Result<Vec<ConsumptionDetail>> {
        let cf = self.cf(cf::CONSUMPTION_DETAILS)?;
        let prefix = keys::string_prefix(transaction_id);
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&prefix, Direction::Forward));
        let mut details = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(db_err)?;
            if !key.starts_with(&prefix) {
                break;
            }
            details.push(deserialize(&value)?);
        }
        Ok(details)
    }
}

/// Transaction over a [`RocksStore`].
pub struct RocksTx<'a> {
    store: &'a RocksStore,
    txn: Transaction<'a, Db>,
}

impl RocksTx<'_> {
    fn get_for_update<T: serde::de::DeserializeOwned>(
        &self,
        name: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        let cf = self.store.cf(name)?;
        self.txn
            .get_for_update_cf(&cf, key, true)
            .map_err(db_err)?
            .map(|data| deserialize(&data))
            .transpose()
    }

    fn put(&self, name: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self.store.cf(name)?;
        self.txn.put_cf(&cf, key, value).map_err(db_err)
    }

    /// Index keys under `prefix`, including writes made by this transaction.
    fn prefix_keys(&self, name: &str, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let cf = self.store.cf(name)?;
        let iter = self
            .txn
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));
        let mut out = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(db_err)?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push(key.to_vec());
        }
        Ok(out)
    }
}

impl StoreTx for RocksTx<'_> {
    fn lock_available_ledger(
        &mut self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>> {
        let cf = self.store.cf(cf::LEDGER_ENTRIES)?;
        let mut entries = Vec::new();
        for key in self.prefix_keys(cf::LEDGER_BY_USER, &keys::user_key(user_id))? {
            let Some(id) = keys::trailing_id(&key) else {
                continue;
            };
            let id_key = keys::id_key(id);
            // Drained and expired entries never become available again.
            let Some(data) = self.txn.get_cf(&cf, &id_key).map_err(db_err)? else {
                continue;
            };
            let seen: LedgerEntry = deserialize(&data)?;
            if !seen.is_available(now) {
                continue;
            }
            let entry: Option<LedgerEntry> = self.get_for_update(cf::LEDGER_ENTRIES, &id_key)?;
            if let Some(entry) = entry.filter(|e| e.is_available(now)) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    fn sum_active_freezes(&mut self, user_id: &UserId, now: DateTime<Utc>) -> Result<Decimal> {
        let cf = self.store.cf(cf::FREEZES)?;
        let mut total = Decimal::ZERO;
        for key in self.prefix_keys(cf::FREEZES_BY_USER, &keys::user_key(user_id))? {
            let Some(session_id) = keys::session_from_freeze_key(&key) else {
                continue;
            };
            let Some(data) = self
                .txn
                .get_cf(&cf, keys::freeze_key(&session_id))
                .map_err(db_err)?
            else {
                continue;
            };
            let freeze: Freeze = deserialize(&data)?;
            if freeze.is_holding(now) {
                total += freeze.amount;
            }
        }
        Ok(total)
    }

    fn lock_freeze(&mut self, session_id: &SessionId) -> Result<Option<Freeze>> {
        self.get_for_update(cf::FREEZES, &keys::freeze_key(session_id))
    }

    fn lock_summary(&mut self, user_id: &UserId) -> Result<Option<UserBalanceSummary>> {
        self.get_for_update(cf::SUMMARIES, &keys::user_key(user_id))
    }

    fn insert_ledger_entry(&mut self, mut entry: LedgerEntry) -> Result<LedgerEntry> {
        entry.id = self.store.next_id();
        self.put(cf::LEDGER_ENTRIES, &keys::id_key(entry.id), &serialize(&entry)?)?;
        self.put(
            cf::LEDGER_BY_USER,
            &keys::ledger_by_user_key(&entry.user_id, entry.expires_at, entry.id),
            &[],
        )?;
        Ok(entry)
    }

    fn update_ledger_entry(&mut self, entry: &LedgerEntry) -> Result<()> {
        let existing: Option<LedgerEntry> =
            self.get_for_update(cf::LEDGER_ENTRIES, &keys::id_key(entry.id))?;
        if existing.is_none() {
            return Err(StoreError::NotFound {
                entity: "ledger entry",
                key: entry.id.to_string(),
            });
        }
        self.put(cf::LEDGER_ENTRIES, &keys::id_key(entry.id), &serialize(entry)?)
    }

    fn insert_freeze(&mut self, mut freeze: Freeze) -> Result<Freeze> {
        let key = keys::freeze_key(&freeze.session_id);
        let existing: Option<Freeze> = self.get_for_update(cf::FREEZES, &key)?;
        if existing.is_some() {
            return Err(StoreError::Conflict {
                entity: "freeze",
                key: freeze.session_id.to_string(),
            });
        }
        freeze.id = self.store.next_id();
        self.put(cf::FREEZES, &key, &serialize(&freeze)?)?;
        self.put(
            cf::FREEZES_BY_USER,
            &keys::freeze_by_user_key(&freeze.user_id, &freeze.session_id),
            &[],
        )?;
        Ok(freeze)
    }

    fn update_freeze(&mut self, freeze: &Freeze) -> Result<()> {
        let key = keys::freeze_key(&freeze.session_id);
        let existing: Option<Freeze> = self.get_for_update(cf::FREEZES, &key)?;
        if existing.is_none() {
            return Err(StoreError::NotFound {
                entity: "freeze",
                key: freeze.session_id.to_string(),
            });
        }
        self.put(cf::FREEZES, &key, &serialize(freeze)?)
    }

    fn put_summary(&mut self, summary: &UserBalanceSummary) -> Result<()> {
        self.put(
            cf::SUMMARIES,
            &keys::user_key(&summary.user_id),
            &serialize(summary)?,
        )
    }

    fn insert_consumption_detail(&mut self, detail: &ConsumptionDetail) -> Result<()> {
        self.put(
            cf::CONSUMPTION_DETAILS,
            &keys::consumption_detail_key(&detail.transaction_id, detail.ledger_id),
            &serialize(detail)?,
        )
    }

    fn insert_transaction(&mut self, mut record: TransactionRecord) -> Result<TransactionRecord> {
        let by_txid = self.store.cf(cf::TRANSACTIONS_BY_TXID)?;
        let taken = self
            .txn
            .get_for_update_cf(&by_txid, record.transaction_id.as_bytes(), true)
            .map_err(db_err)?;
        if taken.is_some() {
            return Err(StoreError::Conflict {
                entity: "transaction",
                key: record.transaction_id,
            });
        }

        record.id = self.store.next_id();
        let id_key = keys::id_key(record.id);
        self.put(cf::TRANSACTIONS, &id_key, &serialize(&record)?)?;
        self.put(
            cf::TRANSACTIONS_BY_TXID,
            record.transaction_id.as_bytes(),
            &id_key,
        )?;
        self.put(
            cf::TRANSACTIONS_BY_USER,
            &keys::record_by_user_key(&record.user_id, record.id),
            &[],
        )?;
        if let Some(source_id) = &record.source_id {
            self.put(
                cf::TRANSACTIONS_BY_SOURCE,
                &keys::record_by_source_key(source_id, record.id),
                &[],
            )?;
        }
        Ok(record)
    }

    fn commit(self) -> Result<()> {
        self.txn.commit().map_err(db_err)
    }
}
