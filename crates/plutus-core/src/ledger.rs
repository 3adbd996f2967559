//! Ledger entries: discrete, independently expiring batches of granted credit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{LedgerId, UNASSIGNED_ID};
use crate::{SourceType, UserId};

/// A single credit grant batch.
///
/// `remaining_amount` never goes below zero. Entries are mutated only by
/// consumption and are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Storage-assigned id ([`UNASSIGNED_ID`] until inserted).
    pub id: LedgerId,

    /// Owner of the credit.
    pub user_id: UserId,

    /// Credit left in this batch.
    pub remaining_amount: Decimal,

    /// Lifecycle status.
    pub status: LedgerStatus,

    /// What produced the grant.
    pub source_type: SourceType,

    /// Caller-defined reference for the source (order id, campaign, ...).
    pub source_id: Option<String>,

    /// After this instant the entry no longer counts towards the balance.
    pub expires_at: DateTime<Utc>,

    /// When the entry was created.
    pub created_at: DateTime<Utc>,

    /// When the entry was last updated.
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create a new, not yet persisted, ACTIVE entry.
    #[must_use]
    pub fn new(
        user_id: UserId,
        amount: Decimal,
        source_type: SourceType,
        source_id: Option<String>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UNASSIGNED_ID,
            user_id,
            remaining_amount: amount,
            status: LedgerStatus::Active,
            source_type,
            source_id,
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the entry can still be drawn from at `now`.
    #[must_use]
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.status == LedgerStatus::Active && self.expires_at > now
    }

    /// Draw up to `wanted` from the entry and return the amount taken.
    ///
    /// Flips the entry to CONSUMED once it is fully drained.
    pub fn draw(&mut self, wanted: Decimal, now: DateTime<Utc>) -> Decimal {
        let take = self.remaining_amount.min(wanted).max(Decimal::ZERO);
        self.remaining_amount -= take;
        if self.remaining_amount.is_zero() {
            self.status = LedgerStatus::Consumed;
        }
        self.updated_at = now;
        take
    }
}

/// Status of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerStatus {
    /// Available for consumption.
    Active,
    /// Held by a reservation.
    Reserved,
    /// Fully drained.
    Consumed,
    /// Past its expiry and written off.
    Expired,
}
