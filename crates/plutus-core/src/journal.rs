//! Journal records: the append-only audit trail and idempotency replay source.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{LedgerId, RecordId, UNASSIGNED_ID};
use crate::{SessionId, SourceType, UserId};

/// A completed operation as recorded in the journal.
///
/// `transaction_id` is unique across the journal. For grant, deduction and
/// session start it is the caller's idempotency id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Storage-assigned id.
    pub id: RecordId,

    /// The user whose balance was affected.
    pub user_id: UserId,

    /// Unique key of the logical operation.
    pub transaction_id: String,

    /// Kind of operation.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,

    /// Amount granted, reserved, consumed or released.
    pub amount: Decimal,

    /// Source of the operation.
    pub source_type: SourceType,

    /// Source reference; the session id for session records.
    pub source_id: Option<String>,

    /// Ledger entry created by a grant.
    pub ledger_entry_id: Option<LedgerId>,

    /// Human-readable description.
    pub description: String,

    /// When the record was written.
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Create a GRANT record for a freshly created ledger entry.
    #[must_use]
    pub fn grant(
        user_id: UserId,
        transaction_id: String,
        amount: Decimal,
        source_type: SourceType,
        source_id: Option<String>,
        ledger_entry_id: LedgerId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UNASSIGNED_ID,
            user_id,
            transaction_id,
            transaction_type: TransactionType::Grant,
            amount,
            source_type,
            source_id,
            ledger_entry_id: Some(ledger_entry_id),
            description: source_type.description().to_string(),
            created_at: now,
        }
    }

    /// Create a CONSUME record for a synchronous deduction.
    #[must_use]
    pub fn consume(
        user_id: UserId,
        transaction_id: String,
        amount: Decimal,
        source_type: SourceType,
        source_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UNASSIGNED_ID,
            user_id,
            transaction_id,
            transaction_type: TransactionType::Consume,
            amount,
            source_type,
            source_id,
            ledger_entry_id: None,
            description: format!("Consumed by {}", source_type.description()),
            created_at: now,
        }
    }

    /// Create a session record (RESERVE, CONSUME or CANCEL).
    #[must_use]
    pub fn session(
        transaction_type: TransactionType,
        user_id: UserId,
        transaction_id: String,
        amount: Decimal,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> Self {
        let description = match transaction_type {
            TransactionType::Reserve => "Credit session reserved",
            TransactionType::Consume => "Credit session settled",
            TransactionType::Cancel => "Credit session cancelled",
            TransactionType::Grant | TransactionType::Expire => "Credit session",
        };
        Self {
            id: UNASSIGNED_ID,
            user_id,
            transaction_id,
            transaction_type,
            amount,
            source_type: SourceType::Session,
            source_id: Some(session_id.to_string()),
            ledger_entry_id: None,
            description: description.to_string(),
            created_at: now,
        }
    }
}

/// Kind of journal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Credit granted.
    Grant,
    /// Credit held by a session.
    Reserve,
    /// Credit consumed.
    Consume,
    /// Session hold released.
    Cancel,
    /// Credit written off at expiry.
    Expire,
}

/// One ledger draw made by a consuming transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionDetail {
    /// Journal transaction that made the draw.
    pub transaction_id: String,

    /// Entry drawn from.
    pub ledger_id: LedgerId,

    /// Amount taken from the entry.
    pub amount: Decimal,

    /// When the draw happened.
    pub created_at: DateTime<Utc>,
}
