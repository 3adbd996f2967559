//! Per-user running balance total.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Denormalized running total of a user's granted-minus-consumed credit.
///
/// Reporting only: the available balance is always recomputed from ledger
/// entries and freezes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBalanceSummary {
    /// The user.
    pub user_id: UserId,

    /// Σ granted − Σ consumed.
    pub total_balance: Decimal,

    /// When the summary was last changed.
    pub updated_at: DateTime<Utc>,
}

impl UserBalanceSummary {
    /// Create an empty summary.
    #[must_use]
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            total_balance: Decimal::ZERO,
            updated_at: now,
        }
    }

    /// Apply a signed change to the total.
    pub fn apply(&mut self, delta: Decimal, now: DateTime<Utc>) {
        self.total_balance += delta;
        self.updated_at = now;
    }
}
