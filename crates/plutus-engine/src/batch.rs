//! Bulk grants.
//!
//! Idempotency keys for the whole batch are claimed in one round-trip,
//! items are validated one by one, and every accepted row is written in a
//! single storage transaction. One bad item never fails the batch.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use plutus_core::{
    CreditError, Decimal, LedgerEntry, Result, TransactionRecord, UserBalanceSummary, UserId,
};
use plutus_store::{Store, StoreTx};

use crate::ledger::GrantRequest;
use crate::CreditEngine;

/// Error code of batch items that failed for an unclassified reason.
pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

/// Outcome of [`CreditEngine::grant_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchGrantResult {
    /// Number of items granted.
    pub success_count: usize,
    /// Number of items rejected.
    pub fail_count: usize,
    /// GRANT records of the granted items, in input order.
    pub success_results: Vec<TransactionRecord>,
    /// The rejected items, in input order.
    pub fail_results: Vec<BatchGrantFailure>,
}

/// A rejected batch item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchGrantFailure {
    /// Recipient of the item.
    pub user_id: UserId,
    /// Idempotency id of the item.
    pub idempotency_id: String,
    /// Stable error code.
    pub error_code: String,
    /// Human-readable reason.
    pub message: String,
}

impl BatchGrantFailure {
    fn new(request: &GrantRequest, err: &CreditError) -> Self {
        let error_code = match err {
            CreditError::DuplicateRequest { .. } => err.code(),
            e if e.is_validation() => e.code(),
            _ => UNKNOWN_ERROR,
        };
        Self {
            user_id: request.user_id,
            idempotency_id: request.idempotency_id.clone(),
            error_code: error_code.to_string(),
            message: err.to_string(),
        }
    }
}

/// An item that passed validation, waiting for the bulk write.
struct Accepted<'a> {
    request: &'a GrantRequest,
    entry: LedgerEntry,
}

impl<S: Store> CreditEngine<S> {
    /// Grant credit to many users at once.
    ///
    /// Items whose idempotency key is already claimed, in an earlier call or
    /// earlier in the same batch, fail with `DUPLICATE_REQUEST` and are not
    /// replayed.
    ///
    /// # Errors
    ///
    /// Item failures are reported in the result. An error is returned only
    /// when the claim round-trip, the bulk write or the cache invalidation
    /// fails; the claimed keys are released unless the write committed.
    pub fn grant_batch(&self, requests: &[GrantRequest]) -> Result<BatchGrantResult> {
        let now = self.clock.now();
        let keys: Vec<String> = requests
            .iter()
            .map(|r| self.keys.grant(&r.user_id, &r.idempotency_id))
            .collect();
        let claimed = self.guard.claim_many(&keys)?;

        let mut result = BatchGrantResult::default();
        let mut accepted = Vec::new();
        let mut accepted_keys = Vec::new();
        let mut release = Vec::new();
        let mut seen = HashSet::new();

        for ((request, key), fresh) in requests.iter().zip(&keys).zip(claimed) {
            if !fresh {
                let err = CreditError::DuplicateRequest { key: key.clone() };
                result.fail_results.push(BatchGrantFailure::new(request, &err));
                continue;
            }
            let checked = request.validate(now).and_then(|expires_at| {
                // Journal transaction ids are unique across users too.
                if !seen.insert(request.idempotency_id.as_str())
                    || self.store.find_transaction(&request.idempotency_id)?.is_some()
                {
                    return Err(CreditError::DuplicateRequest {
                        key: request.idempotency_id.clone(),
                    });
                }
                Ok(expires_at)
            });
            match checked {
                Ok(expires_at) => {
                    accepted.push(Accepted {
                        request,
                        entry: request.entry(expires_at, now),
                    });
                    accepted_keys.push(key.clone());
                }
                Err(err) => {
                    result.fail_results.push(BatchGrantFailure::new(request, &err));
                    release.push(key.clone());
                }
            }
        }
        self.guard.release_many(&release);

        let records = match self.write_batch(accepted, now) {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(error = %err, items = accepted_keys.len(), "Batch grant write failed");
                self.guard.release_many(&accepted_keys);
                return Err(err);
            }
        };

        let mut users: Vec<UserId> = records.iter().map(|r| r.user_id).collect();
        users.sort();
        users.dedup();
        self.balance.invalidate_many(&users)?;

        result.success_count = records.len();
        result.fail_count = result.fail_results.len();
        result.success_results = records;
        tracing::info!(
            items = requests.len(),
            granted = result.success_count,
            failed = result.fail_count,
            users = users.len(),
            "Batch grant processed"
        );
        Ok(result)
    }

    /// Persist accepted items in one transaction.
    fn write_batch(
        &self,
        accepted: Vec<Accepted<'_>>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<TransactionRecord>> {
        if accepted.is_empty() {
            return Ok(Vec::new());
        }

        let deltas = summary_deltas(accepted.iter().map(|item| item.request));

        let mut tx = self.store.begin()?;
        let mut records = Vec::with_capacity(accepted.len());
        for item in accepted {
            let entry = tx.insert_ledger_entry(item.entry)?;
            records.push(tx.insert_transaction(TransactionRecord::grant(
                item.request.user_id,
                item.request.idempotency_id.clone(),
                item.request.amount,
                item.request.source_type,
                item.request.source_id.clone(),
                entry.id,
                now,
            ))?);
        }
        for (user_id, delta) in deltas {
            let mut summary = tx
                .lock_summary(&user_id)?
                .unwrap_or_else(|| UserBalanceSummary::new(user_id, now));
            summary.apply(delta, now);
            tx.put_summary(&summary)?;
        }
        tx.commit()?;
        Ok(records)
    }
}

/// Net summary change per user, keyed in lock order.
///
/// Summary rows are locked by iterating this map, so every batch takes its
/// locks in ascending user order.
fn summary_deltas<'a>(
    requests: impl IntoIterator<Item = &'a GrantRequest>,
) -> BTreeMap<UserId, Decimal> {
    let mut deltas = BTreeMap::new();
    for request in requests {
        *deltas.entry(request.user_id).or_insert(Decimal::ZERO) += request.amount;
    }
    deltas
}

#[cfg(test)]
mod tests {
    use super::*;
    use plutus_core::SourceType;

    fn request(user_id: UserId, amount: i64) -> GrantRequest {
        GrantRequest {
            user_id,
            amount: Decimal::from(amount),
            source_type: SourceType::System,
            source_id: None,
            expires_at: None,
            idempotency_id: String::new(),
        }
    }

    #[test]
    fn deltas_are_summed_in_user_order() {
        let mut users: Vec<UserId> = (0..8).map(|_| UserId::generate()).collect();
        let requests: Vec<_> = users
            .iter()
            .rev()
            .chain(users.iter())
            .map(|u| request(*u, 2))
            .collect();

        let deltas = summary_deltas(&requests);
        users.sort();
        assert_eq!(deltas.keys().copied().collect::<Vec<_>>(), users);
        assert!(deltas.values().all(|d| *d == Decimal::from(4)));
    }
}
