//! Synchronous deduction.

use serde::{Deserialize, Serialize};

use plutus_core::{Decimal, Result, SourceType, TransactionRecord, TransactionType, UserId};
use plutus_store::{Store, StoreTx};

use crate::ledger::{consume, debit_summary, ensure_positive};
use crate::CreditEngine;

/// A request to consume credit immediately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductRequest {
    /// Payer.
    pub user_id: UserId,
    /// Amount to consume; must be positive.
    pub amount: Decimal,
    /// What consumed the credit.
    pub source_type: SourceType,
    /// Caller-defined source reference.
    pub source_id: Option<String>,
    /// Caller's idempotency id; becomes the journal transaction id.
    pub idempotency_id: String,
}

impl<S: Store> CreditEngine<S> {
    /// Consume credit FIFO by expiry in one step.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_AMOUNT`, `INSUFFICIENT_BALANCE`, `USER_NOT_FOUND`,
    /// `DUPLICATE_REQUEST`, or a storage/cache error.
    pub fn deduct(&self, request: DeductRequest) -> Result<TransactionRecord> {
        let user_id = request.user_id;
        let key = self.keys.deduct(&user_id, &request.idempotency_id);

        self.guard.run(
            &key,
            || self.journaled(&request.idempotency_id, &user_id, TransactionType::Consume),
            || {
                ensure_positive(request.amount)?;
                let now = self.clock.now();

                self.balance
                    .ensure_available(self.store.as_ref(), &user_id, request.amount, now)?;

                let mut tx = self.store.begin()?;
                let details = consume(
                    &mut tx,
                    &user_id,
                    request.amount,
                    &request.idempotency_id,
                    now,
                )?;
                debit_summary(&mut tx, &user_id, request.amount, now)?;
                let record = tx.insert_transaction(TransactionRecord::consume(
                    user_id,
                    request.idempotency_id.clone(),
                    request.amount,
                    request.source_type,
                    request.source_id.clone(),
                    now,
                ))?;
                tx.commit()?;

                self.balance.invalidate(&user_id)?;
                tracing::info!(
                    user_id = %user_id,
                    amount = %request.amount,
                    source_type = %request.source_type,
                    entries = details.len(),
                    "Credit deducted"
                );
                Ok(record)
            },
        )
    }
}
