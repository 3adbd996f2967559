//! Ledger entries: grants and FIFO consumption.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use plutus_core::{
    ConsumptionDetail, CreditError, Decimal, LedgerEntry, Result, SourceType, TransactionRecord,
    TransactionType, UserBalanceSummary, UserId,
};
use plutus_store::{Store, StoreTx};

use crate::CreditEngine;

/// A request to grant credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRequest {
    /// Recipient.
    pub user_id: UserId,
    /// Amount to grant; must be positive.
    pub amount: Decimal,
    /// What produced the grant.
    pub source_type: SourceType,
    /// Caller-defined source reference.
    pub source_id: Option<String>,
    /// Expiry of the new entry; required and strictly in the future.
    pub expires_at: Option<DateTime<Utc>>,
    /// Caller's idempotency id; becomes the journal transaction id.
    pub idempotency_id: String,
}

impl GrantRequest {
    /// Validate the request at `now` and return the expiry to use.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_AMOUNT` or `INVALID_EXPIRATION`.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        ensure_positive(self.amount)?;
        match self.expires_at {
            None => Err(CreditError::InvalidExpiration(
                "expiration time is required".into(),
            )),
            Some(at) if at <= now => Err(CreditError::InvalidExpiration(format!(
                "expiration time {at} is not in the future"
            ))),
            Some(at) => Ok(at),
        }
    }

    pub(crate) fn entry(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry::new(
            self.user_id,
            self.amount,
            self.source_type,
            self.source_id.clone(),
            expires_at,
            now,
        )
    }
}

/// Reject zero and negative amounts.
///
/// # Errors
///
/// Returns `INVALID_AMOUNT`.
pub fn ensure_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(CreditError::InvalidAmount(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

/// Consume `amount` from a user's entries, earliest expiry first.
///
/// Locks every available entry, re-checks the balance under those locks
/// (freezes still ACTIVE in `tx` count against it) and then drains entries
/// in order, recording one [`ConsumptionDetail`] per touched entry.
///
/// # Errors
///
/// Returns `INSUFFICIENT_BALANCE` without writing anything if the locked
/// entries minus active freezes do not cover `amount`.
pub fn consume<T: StoreTx>(
    tx: &mut T,
    user_id: &UserId,
    amount: Decimal,
    transaction_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<ConsumptionDetail>> {
    let mut entries = tx.lock_available_ledger(user_id, now)?;
    let locked: Decimal = entries.iter().map(|e| e.remaining_amount).sum();
    let frozen = tx.sum_active_freezes(user_id, now)?;
    let available = locked - frozen;
    if available < amount {
        return Err(CreditError::InsufficientBalance {
            available,
            required: amount,
        });
    }

    let mut needed = amount;
    let mut details = Vec::new();
    for entry in &mut entries {
        if needed <= Decimal::ZERO {
            break;
        }
        let taken = entry.draw(needed, now);
        if taken.is_zero() {
            continue;
        }
        needed -= taken;
        tx.update_ledger_entry(entry)?;

        let detail = ConsumptionDetail {
            transaction_id: transaction_id.to_string(),
            ledger_id: entry.id,
            amount: taken,
            created_at: now,
        };
        tx.insert_consumption_detail(&detail)?;
        details.push(detail);
    }
    Ok(details)
}

/// Add `amount` to the user's summary, creating it on first grant.
pub(crate) fn credit_summary<T: StoreTx>(
    tx: &mut T,
    user_id: &UserId,
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut summary = tx
        .lock_summary(user_id)?
        .unwrap_or_else(|| UserBalanceSummary::new(*user_id, now));
    summary.apply(amount, now);
    tx.put_summary(&summary)?;
    Ok(())
}

/// Subtract `amount` from the user's summary.
pub(crate) fn debit_summary<T: StoreTx>(
    tx: &mut T,
    user_id: &UserId,
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut summary = tx
        .lock_summary(user_id)?
        .ok_or_else(|| CreditError::UserNotFound {
            user_id: user_id.to_string(),
        })?;
    summary.apply(-amount, now);
    tx.put_summary(&summary)?;
    Ok(())
}

impl<S: Store> CreditEngine<S> {
    /// Grant credit as a new expiring ledger entry.
    ///
    /// Replays the original GRANT record when `idempotency_id` was already
    /// used by this user.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_AMOUNT`, `INVALID_EXPIRATION`, `DUPLICATE_REQUEST`,
    /// or a storage/cache error.
    pub fn grant(&self, request: GrantRequest) -> Result<TransactionRecord> {
        let user_id = request.user_id;
        let key = self.keys.grant(&user_id, &request.idempotency_id);

        self.guard.run(
            &key,
            || self.journaled(&request.idempotency_id, &user_id, TransactionType::Grant),
            || {
                let now = self.clock.now();
                let expires_at = request.validate(now)?;

                let mut tx = self.store.begin()?;
                let entry = tx.insert_ledger_entry(request.entry(expires_at, now))?;
                credit_summary(&mut tx, &user_id, request.amount, now)?;
                let record = tx.insert_transaction(TransactionRecord::grant(
                    user_id,
                    request.idempotency_id.clone(),
                    request.amount,
                    request.source_type,
                    request.source_id.clone(),
                    entry.id,
                    now,
                ))?;
                tx.commit()?;

                self.balance.invalidate(&user_id)?;
                tracing::info!(
                    user_id = %user_id,
                    amount = %request.amount,
                    source_type = %request.source_type,
                    ledger_id = entry.id,
                    expires_at = %expires_at,
                    "Credit granted"
                );
                Ok(record)
            },
        )
    }
}
