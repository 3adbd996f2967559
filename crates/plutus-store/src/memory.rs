//! In-memory storage implementation.
//!
//! A transaction holds the store mutex for its whole lifetime and writes to
//! the shared tables in place, recording the prior value of every row it
//! touches. Dropping the transaction without committing replays that undo
//! log, so an aborted transaction leaves no trace. Holding the mutex makes
//! transactions serializable: every row they touch is effectively locked.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use plutus_core::{
    ConsumptionDetail, Decimal, Freeze, LedgerEntry, LedgerId, RecordId, SessionId,
    TransactionRecord, UserBalanceSummary, UserId,
};

use crate::error::{Result, StoreError};
use crate::{Store, StoreTx};

#[derive(Debug, Default)]
struct Tables {
    last_id: i64,
    ledger: BTreeMap<LedgerId, LedgerEntry>,
    freezes: HashMap<SessionId, Freeze>,
    summaries: HashMap<UserId, UserBalanceSummary>,
    transactions: BTreeMap<RecordId, TransactionRecord>,
    transaction_ids: HashMap<String, RecordId>,
    details: Vec<ConsumptionDetail>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn user_ledger(&self, user_id: &UserId) -> Vec<LedgerEntry> {
        let mut entries: Vec<_> = self
            .ledger
            .values()
            .filter(|e| e.user_id == *user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.expires_at.cmp(&b.expires_at).then(a.id.cmp(&b.id)));
        entries
    }

    fn available_ledger(&self, user_id: &UserId, now: DateTime<Utc>) -> Vec<LedgerEntry> {
        self.user_ledger(user_id)
            .into_iter()
            .filter(|e| e.is_available(now))
            .collect()
    }

    fn holding(&self, user_id: &UserId, now: DateTime<Utc>) -> impl Iterator<Item = &Freeze> + '_ {
        let user_id = *user_id;
        self.freezes
            .values()
            .filter(move |f| f.user_id == user_id && f.is_holding(now))
    }

    fn frozen(&self, user_id: &UserId, now: DateTime<Utc>) -> Decimal {
        self.holding(user_id, now).map(|f| f.amount).sum()
    }
}

/// Prior state of a row written by an open transaction.
#[derive(Debug)]
enum Undo {
    Ledger(LedgerId, Option<LedgerEntry>),
    Freeze(SessionId, Option<Freeze>),
    Summary(UserId, Option<UserBalanceSummary>),
    Transaction(RecordId, String),
}

/// Process-local storage backend for tests and single-node development.
///
/// Aggregate reads scan every row of the store, and a transaction serializes
/// against all others. Deployments with real traffic or durability needs use
/// `RocksStore`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Database("memory store mutex poisoned".into()))
    }
}

impl Store for MemoryStore {
    type Tx<'a> = MemoryTx<'a>
    where
        Self: 'a;

    fn begin(&self) -> Result<MemoryTx<'_>> {
        let tables = self.read()?;
        Ok(MemoryTx {
            last_id: tables.last_id,
            details_len: tables.details.len(),
            tables,
            undo: Vec::new(),
            committed: false,
        })
    }

    fn sum_available_ledger(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Decimal> {
        Ok(self
            .read()?
            .available_ledger(user_id, now)
            .iter()
            .map(|e| e.remaining_amount)
            .sum())
    }

    fn sum_active_freezes(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Decimal> {
        Ok(self.read()?.frozen(user_id, now))
    }

    fn next_expiry(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        let tables = self.read()?;
        let ledger = tables
            .available_ledger(user_id, now)
            .first()
            .map(|e| e.expires_at);
        let freezes = tables.holding(user_id, now).map(|f| f.expires_at).min();
        Ok(ledger.into_iter().chain(freezes).min())
    }

    fn get_ledger_entry(&self, id: LedgerId) -> Result<Option<LedgerEntry>> {
        Ok(self.read()?.ledger.get(&id).cloned())
    }

    fn list_ledger_entries(&self, user_id: &UserId) -> Result<Vec<LedgerEntry>> {
        Ok(self.read()?.user_ledger(user_id))
    }

    fn get_summary(&self, user_id: &UserId) -> Result<Option<UserBalanceSummary>> {
        Ok(self.read()?.summaries.get(user_id).cloned())
    }

    fn get_freeze(&self, session_id: &SessionId) -> Result<Option<Freeze>> {
        Ok(self.read()?.freezes.get(session_id).cloned())
    }

    fn find_transaction(&self, transaction_id: &str) -> Result<Option<TransactionRecord>> {
        let tables = self.read()?;
        Ok(tables
            .transaction_ids
            .get(transaction_id)
            .and_then(|id| tables.transactions.get(id))
            .cloned())
    }

    fn find_transactions_by_source(&self, source_id: &str) -> Result<Vec<TransactionRecord>> {
        Ok(self
            .read()?
            .transactions
            .values()
            .filter(|r| r.source_id.as_deref() == Some(source_id))
            .cloned()
            .collect())
    }

    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TransactionRecord>> {
        Ok(self
            .read()?
            .transactions
            .values()
            .rev()
            .filter(|r| r.user_id == *user_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn count_transactions_by_user(&self, user_id: &UserId) -> Result<usize> {
        Ok(self
            .read()?
            .transactions
            .values()
            .filter(|r| r.user_id == *user_id)
            .count())
    }

    fn consumption_details(&self, transaction_id: &str) -> Result<Vec<ConsumptionDetail>> {
        Ok(self
            .read()?
            .details
            .iter()
            .filter(|d| d.transaction_id == transaction_id)
            .cloned()
            .collect())
    }
}

/// Transaction over a [`MemoryStore`].
pub struct MemoryTx<'a> {
    tables: MutexGuard<'a, Tables>,
    undo: Vec<Undo>,
    last_id: i64,
    details_len: usize,
    committed: bool,
}

impl MemoryTx<'_> {
    fn rollback(&mut self) {
        while let Some(undo) = self.undo.pop() {
            let tables = &mut *self.tables;
            match undo {
                Undo::Ledger(id, Some(prior)) => {
                    tables.ledger.insert(id, prior);
                }
                Undo::Ledger(id, None) => {
                    tables.ledger.remove(&id);
                }
                Undo::Freeze(session_id, Some(prior)) => {
                    tables.freezes.insert(session_id, prior);
                }
                Undo::Freeze(session_id, None) => {
                    tables.freezes.remove(&session_id);
                }
                Undo::Summary(user_id, Some(prior)) => {
                    tables.summaries.insert(user_id, prior);
                }
                Undo::Summary(user_id, None) => {
                    tables.summaries.remove(&user_id);
                }
                Undo::Transaction(id, transaction_id) => {
                    tables.transactions.remove(&id);
                    tables.transaction_ids.remove(&transaction_id);
                }
            }
        }
        self.tables.details.truncate(self.details_len);
        self.tables.last_id = self.last_id;
    }
}

impl Drop for MemoryTx<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.rollback();
        }
    }
}

impl StoreTx for MemoryTx<'_> {
    fn lock_available_ledger(
        &mut self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>> {
        Ok(self.tables.available_ledger(user_id, now))
    }

    fn sum_active_freezes(&mut self, user_id: &UserId, now: DateTime<Utc>) -> Result<Decimal> {
        Ok(self.tables.frozen(user_id, now))
    }

    fn lock_freeze(&mut self, session_id: &SessionId) -> Result<Option<Freeze>> {
        Ok(self.tables.freezes.get(session_id).cloned())
    }

    fn lock_summary(&mut self, user_id: &UserId) -> Result<Option<UserBalanceSummary>> {
        Ok(self.tables.summaries.get(user_id).cloned())
    }

    fn insert_ledger_entry(&mut self, mut entry: LedgerEntry) -> Result<LedgerEntry> {
        entry.id = self.tables.next_id();
        self.tables.ledger.insert(entry.id, entry.clone());
        self.undo.push(Undo::Ledger(entry.id, None));
        Ok(entry)
    }

    fn update_ledger_entry(&mut self, entry: &LedgerEntry) -> Result<()> {
        let slot = self
            .tables
            .ledger
            .get_mut(&entry.id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "ledger entry",
                key: entry.id.to_string(),
            })?;
        let prior = std::mem::replace(slot, entry.clone());
        self.undo.push(Undo::Ledger(entry.id, Some(prior)));
        Ok(())
    }

    fn insert_freeze(&mut self, mut freeze: Freeze) -> Result<Freeze> {
        if self.tables.freezes.contains_key(&freeze.session_id) {
            return Err(StoreError::Conflict {
                entity: "freeze",
                key: freeze.session_id.to_string(),
            });
        }
        freeze.id = self.tables.next_id();
        self.tables.freezes.insert(freeze.session_id, freeze.clone());
        self.undo.push(Undo::Freeze(freeze.session_id, None));
        Ok(freeze)
    }

    fn update_freeze(&mut self, freeze: &Freeze) -> Result<()> {
        let slot = self
            .tables
            .freezes
            .get_mut(&freeze.session_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "freeze",
                key: freeze.session_id.to_string(),
            })?;
        let prior = std::mem::replace(slot, freeze.clone());
        self.undo.push(Undo::Freeze(freeze.session_id, Some(prior)));
        Ok(())
    }

    fn put_summary(&mut self, summary: &UserBalanceSummary) -> Result<()> {
        let prior = self
            .tables
            .summaries
            .insert(summary.user_id, summary.clone());
        self.undo.push(Undo::Summary(summary.user_id, prior));
        Ok(())
    }

    fn insert_consumption_detail(&mut self, detail: &ConsumptionDetail) -> Result<()> {
        self.tables.details.push(detail.clone());
        Ok(())
    }

    fn insert_transaction(&mut self, mut record: TransactionRecord) -> Result<TransactionRecord> {
        if self
            .tables
            .transaction_ids
            .contains_key(&record.transaction_id)
        {
            return Err(StoreError::Conflict {
                entity: "transaction",
                key: record.transaction_id,
            });
        }
        record.id = self.tables.next_id();
        self.tables
            .transaction_ids
            .insert(record.transaction_id.clone(), record.id);
        self.tables.transactions.insert(record.id, record.clone());
        self.undo
            .push(Undo::Transaction(record.id, record.transaction_id.clone()));
        Ok(record)
    }

    fn commit(mut self) -> Result<()> {
        self.committed = true;
        Ok(())
    }
}
