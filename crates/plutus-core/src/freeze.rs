//! Session-scoped holds against the available balance.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{FreezeId, UNASSIGNED_ID};
use crate::{SessionId, UserId};

/// A hold created by a credit session.
///
/// A freeze never touches ledger entries; it only lowers the computed
/// available balance while it is ACTIVE and unexpired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Freeze {
    /// Storage-assigned id.
    pub id: FreezeId,

    /// Owner of the held credit.
    pub user_id: UserId,

    /// Session this freeze belongs to (unique).
    pub session_id: SessionId,

    /// Amount held.
    pub amount: Decimal,

    /// End of the hold.
    pub expires_at: DateTime<Utc>,

    /// The caller's idempotency id for the session start.
    pub request_id: String,

    /// Lifecycle status.
    pub status: FreezeStatus,

    /// When the freeze was created.
    pub created_at: DateTime<Utc>,
}

impl Freeze {
    /// Create a new ACTIVE freeze.
    #[must_use]
    pub fn new(
        user_id: UserId,
        session_id: SessionId,
        amount: Decimal,
        request_id: String,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UNASSIGNED_ID,
            user_id,
            session_id,
            amount,
            expires_at,
            request_id,
            status: FreezeStatus::Active,
            created_at: now,
        }
    }

    /// Whether the freeze currently reduces the available balance.
    #[must_use]
    pub fn is_holding(&self, now: DateTime<Utc>) -> bool {
        self.status == FreezeStatus::Active && self.expires_at > now
    }
}

/// Status of a freeze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FreezeStatus {
    /// Holding credit for an open session.
    Active,
    /// Settled.
    Consumed,
    /// Released without consumption.
    Cancelled,
}

impl FreezeStatus {
    /// Whether no further transition is allowed.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Consumed | Self::Cancelled)
    }
}
