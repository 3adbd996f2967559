//! Balance and journal queries.

use serde::{Deserialize, Serialize};

use plutus_core::{
    ConsumptionDetail, Decimal, LedgerEntry, Result, TransactionRecord, UserBalanceSummary, UserId,
};
use plutus_store::Store;

use crate::CreditEngine;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Largest page size served.
pub const MAX_PAGE_SIZE: usize = 100;

/// One page of a user's journal, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPage {
    /// Records on this page.
    pub transactions: Vec<TransactionRecord>,
    /// Zero-based page index.
    pub page: usize,
    /// Page size actually used.
    pub size: usize,
    /// Total records of the user.
    pub total: usize,
}

impl<S: Store> CreditEngine<S> {
    /// Available balance: unexpired ACTIVE ledger credit minus active holds.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the aggregates cannot be read.
    pub fn available_balance(&self, user_id: &UserId) -> Result<Decimal> {
        self.balance
            .available_balance(self.store.as_ref(), user_id, self.clock.now())
    }

    /// The user's running total, if they were ever granted credit.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails.
    pub fn summary(&self, user_id: &UserId) -> Result<Option<UserBalanceSummary>> {
        Ok(self.store.get_summary(user_id)?)
    }

    /// All of the user's ledger entries, earliest expiry first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails.
    pub fn ledger_entries(&self, user_id: &UserId) -> Result<Vec<LedgerEntry>> {
        Ok(self.store.list_ledger_entries(user_id)?)
    }

    /// A page of the user's journal. `size` is clamped to
    /// `1..=MAX_PAGE_SIZE`; `None` means [`DEFAULT_PAGE_SIZE`].
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails.
    pub fn transaction_history(
        &self,
        user_id: &UserId,
        page: usize,
        size: Option<usize>,
    ) -> Result<TransactionPage> {
        let size = size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = page.saturating_mul(size);
        let transactions = self.store.list_transactions_by_user(user_id, size, offset)?;
        let total = self.store.count_transactions_by_user(user_id)?;
        Ok(TransactionPage {
            transactions,
            page,
            size,
            total,
        })
    }

    /// Journal record by transaction id.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails.
    pub fn find_transaction(&self, transaction_id: &str) -> Result<Option<TransactionRecord>> {
        Ok(self.store.find_transaction(transaction_id)?)
    }

    /// Ledger draws made by a consuming transaction.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails.
    pub fn consumption_details(&self, transaction_id: &str) -> Result<Vec<ConsumptionDetail>> {
        Ok(self.store.consumption_details(transaction_id)?)
    }
}
