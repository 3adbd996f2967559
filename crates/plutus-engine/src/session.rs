//! Credit sessions: reserve, then settle or cancel.
//!
//! A session holds credit with a [`Freeze`] that lowers the available
//! balance without touching ledger entries. Settlement consumes the final
//! amount FIFO; cancellation just releases the hold. Both are terminal and
//! mutually exclusive: the freeze row is locked and its status checked
//! inside the transaction that changes it.

use serde::{Deserialize, Serialize};

use plutus_core::{
    generate_transaction_id, CreditError, Decimal, Freeze, FreezeStatus, Result, SessionId,
    TransactionRecord, TransactionType, UserId,
};
use plutus_store::{Store, StoreTx};

use crate::ledger::{consume, debit_summary, ensure_positive};
use crate::CreditEngine;

/// Result of [`CreditEngine::start_session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStart {
    /// Server-generated session id.
    pub session_id: SessionId,
    /// Owner of the session.
    pub user_id: UserId,
    /// Amount held.
    pub amount: Decimal,
    /// The caller's idempotency id.
    pub idempotency_id: String,
}

impl SessionStart {
    /// Rebuild the result from the RESERVE record of a session.
    #[must_use]
    pub fn from_record(record: &TransactionRecord) -> Option<Self> {
        if record.transaction_type != TransactionType::Reserve {
            return None;
        }
        let session_id = record.source_id.as_deref()?.parse().ok()?;
        Some(Self {
            session_id,
            user_id: record.user_id,
            amount: record.amount,
            idempotency_id: record.transaction_id.clone(),
        })
    }
}

impl<S: Store> CreditEngine<S> {
    /// Reserve `max_amount` for a new session.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_AMOUNT`, `INSUFFICIENT_BALANCE`, `DUPLICATE_REQUEST`,
    /// or a storage/cache error.
    pub fn start_session(
        &self,
        user_id: UserId,
        max_amount: Decimal,
        idempotency_id: &str,
    ) -> Result<SessionStart> {
        let key = self.keys.session_start(&user_id, idempotency_id);

        self.guard.run(
            &key,
            || {
                Ok(self
                    .journaled(idempotency_id, &user_id, TransactionType::Reserve)?
                    .as_ref()
                    .and_then(SessionStart::from_record))
            },
            || {
                ensure_positive(max_amount)?;
                let now = self.clock.now();

                self.balance
                    .ensure_available(self.store.as_ref(), &user_id, max_amount, now)?;

                let session_id = SessionId::generate();
                let mut tx = self.store.begin()?;

                // Lock the entries the hold is drawn against so concurrent
                // reservations for the same user see each other's freezes.
                let locked: Decimal = tx
                    .lock_available_ledger(&user_id, now)?
                    .iter()
                    .map(|e| e.remaining_amount)
                    .sum();
                let available = locked - tx.sum_active_freezes(&user_id, now)?;
                if available < max_amount {
                    return Err(CreditError::InsufficientBalance {
                        available,
                        required: max_amount,
                    });
                }

                let freeze = tx.insert_freeze(Freeze::new(
                    user_id,
                    session_id,
                    max_amount,
                    idempotency_id.to_string(),
                    now + self.config.freeze_ttl(),
                    now,
                ))?;
                tx.insert_transaction(TransactionRecord::session(
                    TransactionType::Reserve,
                    user_id,
                    idempotency_id.to_string(),
                    max_amount,
                    session_id,
                    now,
                ))?;
                tx.commit()?;

                self.balance.invalidate(&user_id)?;
                tracing::info!(
                    user_id = %user_id,
                    session_id = %session_id,
                    amount = %max_amount,
                    expires_at = %freeze.expires_at,
                    "Credit session started"
                );
                Ok(SessionStart {
                    session_id,
                    user_id,
                    amount: max_amount,
                    idempotency_id: idempotency_id.to_string(),
                })
            },
        )
    }

    /// Settle a session by consuming `final_amount` of the held credit.
    ///
    /// A repeated settle replays the CONSUME record of the session.
    ///
    /// # Errors
    ///
    /// Returns `SESSION_NOT_FOUND`, `INVALID_AMOUNT`,
    /// `AMOUNT_EXCEEDS_RESERVATION`, `INVALID_SESSION_STATUS`,
    /// `INSUFFICIENT_BALANCE`, `USER_NOT_FOUND`, `DUPLICATE_REQUEST`, or a
    /// storage/cache error.
    pub fn settle_session(
        &self,
        session_id: &SessionId,
        final_amount: Decimal,
    ) -> Result<TransactionRecord> {
        let key = self.keys.session_settle(session_id);

        self.guard.run(
            &key,
            || self.session_record(session_id, TransactionType::Consume),
            || {
                let now = self.clock.now();
                let mut tx = self.store.begin()?;

                let mut freeze = tx.lock_freeze(session_id)?.ok_or_else(|| {
                    CreditError::SessionNotFound {
                        session_id: session_id.to_string(),
                    }
                })?;
                ensure_positive(final_amount)?;
                if final_amount > freeze.amount {
                    tracing::warn!(
                        session_id = %session_id,
                        reserved = %freeze.amount,
                        requested = %final_amount,
                        "Rejected settlement above reservation"
                    );
                    return Err(CreditError::AmountExceedsReservation {
                        reserved: freeze.amount,
                        requested: final_amount,
                    });
                }
                if freeze.status != FreezeStatus::Active {
                    return Err(CreditError::InvalidSessionStatus {
                        session_id: session_id.to_string(),
                        status: freeze.status,
                    });
                }

                // Flip first so this session's own hold no longer counts
                // against the consumption below.
                freeze.status = FreezeStatus::Consumed;
                tx.update_freeze(&freeze)?;

                let transaction_id = generate_transaction_id();
                let details = consume(&mut tx, &freeze.user_id, final_amount, &transaction_id, now)?;
                debit_summary(&mut tx, &freeze.user_id, final_amount, now)?;
                let record = tx.insert_transaction(TransactionRecord::session(
                    TransactionType::Consume,
                    freeze.user_id,
                    transaction_id,
                    final_amount,
                    *session_id,
                    now,
                ))?;
                tx.commit()?;

                self.balance.invalidate(&freeze.user_id)?;
                tracing::info!(
                    user_id = %freeze.user_id,
                    session_id = %session_id,
                    reserved = %freeze.amount,
                    settled = %final_amount,
                    entries = details.len(),
                    "Credit session settled"
                );
                Ok(record)
            },
        )
    }

    /// Cancel a session and release its hold.
    ///
    /// A repeated cancel is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `SESSION_NOT_FOUND`, `INVALID_SESSION_STATUS`, or a
    /// storage/cache error.
    pub fn cancel_session(&self, session_id: &SessionId) -> Result<()> {
        let key = self.keys.session_cancel(session_id);

        self.guard
            .run_once(
                &key,
                || {
                    Ok(self
                        .session_record(session_id, TransactionType::Cancel)?
                        .is_some())
                },
                || {
                    let now = self.clock.now();
                    let mut tx = self.store.begin()?;

                    let mut freeze = tx.lock_freeze(session_id)?.ok_or_else(|| {
                        CreditError::SessionNotFound {
                            session_id: session_id.to_string(),
                        }
                    })?;
                    if freeze.status != FreezeStatus::Active {
                        return Err(CreditError::InvalidSessionStatus {
                            session_id: session_id.to_string(),
                            status: freeze.status,
                        });
                    }

                    freeze.status = FreezeStatus::Cancelled;
                    tx.update_freeze(&freeze)?;
                    tx.insert_transaction(TransactionRecord::session(
                        TransactionType::Cancel,
                        freeze.user_id,
                        generate_transaction_id(),
                        freeze.amount,
                        *session_id,
                        now,
                    ))?;
                    tx.commit()?;

                    self.balance.invalidate(&freeze.user_id)?;
                    tracing::info!(
                        user_id = %freeze.user_id,
                        session_id = %session_id,
                        released = %freeze.amount,
                        "Credit session cancelled"
                    );
                    Ok(())
                },
            )
            .map(|_| ())
    }

    /// Current state of a session.
    ///
    /// # Errors
    ///
    /// Returns `SESSION_NOT_FOUND` if the session does not exist.
    pub fn get_session(&self, session_id: &SessionId) -> Result<Freeze> {
        self.store
            .get_freeze(session_id)?
            .ok_or_else(|| CreditError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    /// Latest `kind` record written for a session.
    fn session_record(
        &self,
        session_id: &SessionId,
        kind: TransactionType,
    ) -> Result<Option<TransactionRecord>> {
        Ok(self
            .store
            .find_transactions_by_source(&session_id.to_string())?
            .into_iter()
            .filter(|r| r.transaction_type == kind)
            .last())
    }
}
