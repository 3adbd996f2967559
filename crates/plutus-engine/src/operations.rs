//! Object-safe view of the engine.
//!
//! [`CreditEngine`] is generic over its store. Callers that pick a backend
//! at runtime hold an `Arc<dyn CreditOperations>` instead.

use plutus_core::{
    ConsumptionDetail, Decimal, Freeze, LedgerEntry, Result, SessionId, TransactionRecord,
    UserBalanceSummary, UserId,
};
use plutus_store::Store;

use crate::{
    BatchGrantResult, CreditEngine, DeductRequest, GrantRequest, SessionStart, TransactionPage,
};

/// Every ledger operation, independent of the storage backend.
///
/// See the inherent methods of [`CreditEngine`] for semantics and errors.
#[allow(missing_docs, clippy::missing_errors_doc)]
pub trait CreditOperations: Send + Sync {
    fn grant(&self, request: GrantRequest) -> Result<TransactionRecord>;
    fn grant_batch(&self, requests: &[GrantRequest]) -> Result<BatchGrantResult>;
    fn deduct(&self, request: DeductRequest) -> Result<TransactionRecord>;
    fn available_balance(&self, user_id: &UserId) -> Result<Decimal>;
    fn summary(&self, user_id: &UserId) -> Result<Option<UserBalanceSummary>>;
    fn ledger_entries(&self, user_id: &UserId) -> Result<Vec<LedgerEntry>>;
    fn start_session(
        &self,
        user_id: UserId,
        max_amount: Decimal,
        idempotency_id: &str,
    ) -> Result<SessionStart>;
    fn settle_session(&self, session_id: &SessionId, final_amount: Decimal)
        -> Result<TransactionRecord>;
    fn cancel_session(&self, session_id: &SessionId) -> Result<()>;
    fn get_session(&self, session_id: &SessionId) -> Result<Freeze>;
    fn transaction_history(
        &self,
        user_id: &UserId,
        page: usize,
        size: Option<usize>,
    ) -> Result<TransactionPage>;
    fn find_transaction(&self, transaction_id: &str) -> Result<Option<TransactionRecord>>;
    fn consumption_details(&self, transaction_id: &str) -> Result<Vec<ConsumptionDetail>>;
}

impl<S: Store> CreditOperations for CreditEngine<S> {
    fn grant(&self, request: GrantRequest) -> Result<TransactionRecord> {
        CreditEngine::grant(self, request)
    }

    fn grant_batch(&self, requests: &[GrantRequest]) -> Result<BatchGrantResult> {
        CreditEngine::grant_batch(self, requests)
    }

    fn deduct(&self, request: DeductRequest) -> Result<TransactionRecord> {
        CreditEngine::deduct(self, request)
    }

    fn available_balance(&self, user_id: &UserId) -> Result<Decimal> {
        CreditEngine::available_balance(self, user_id)
    }

    fn summary(&self, user_id: &UserId) -> Result<Option<UserBalanceSummary>> {
        CreditEngine::summary(self, user_id)
    }

    fn ledger_entries(&self, user_id: &UserId) -> Result<Vec<LedgerEntry>> {
        CreditEngine::ledger_entries(self, user_id)
    }

    fn start_session(
        &self,
        user_id: UserId,
        max_amount: Decimal,
        idempotency_id: &str,
    ) -> Result<SessionStart> {
        CreditEngine::start_session(self, user_id, max_amount, idempotency_id)
    }

    fn settle_session(
        &self,
        session_id: &SessionId,
        final_amount: Decimal,
    ) -> Result<TransactionRecord> {
        CreditEngine::settle_session(self, session_id, final_amount)
    }

    fn cancel_session(&self, session_id: &SessionId) -> Result<()> {
        CreditEngine::cancel_session(self, session_id)
    }

    fn get_session(&self, session_id: &SessionId) -> Result<Freeze> {
        CreditEngine::get_session(self, session_id)
    }

    fn transaction_history(
        &self,
        user_id: &UserId,
        page: usize,
        size: Option<usize>,
    ) -> Result<TransactionPage> {
        CreditEngine::transaction_history(self, user_id, page, size)
    }

    fn find_transaction(&self, transaction_id: &str) -> Result<Option<TransactionRecord>> {
        CreditEngine::find_transaction(self, transaction_id)
    }

    fn consumption_details(&self, transaction_id: &str) -> Result<Vec<ConsumptionDetail>> {
        CreditEngine::consumption_details(self, transaction_id)
    }
}
