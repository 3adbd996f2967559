//! Cache/lock key layout.

use plutus_core::{SessionId, UserId};

/// Builds namespaced cache/lock keys.
#[derive(Debug, Clone, Default)]
pub struct KeyBuilder {
    prefix: String,
}

impl KeyBuilder {
    /// Create a builder that prepends `prefix` to every key.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Idempotency key of a grant.
    #[must_use]
    pub fn grant(&self, user_id: &UserId, idempotency_id: &str) -> String {
        format!("{}credit:grant:{user_id}:{idempotency_id}", self.prefix)
    }

    /// Idempotency key of a synchronous deduction.
    #[must_use]
    pub fn deduct(&self, user_id: &UserId, idempotency_id: &str) -> String {
        format!("{}credit:deduct:{user_id}:{idempotency_id}", self.prefix)
    }

    /// Idempotency key of a session start.
    #[must_use]
    pub fn session_start(&self, user_id: &UserId, idempotency_id: &str) -> String {
        format!("{}credit:session:start:{user_id}:{idempotency_id}", self.prefix)
    }

    /// Idempotency key of a session settlement.
    #[must_use]
    pub fn session_settle(&self, session_id: &SessionId) -> String {
        format!("{}credit:session:settle:{session_id}", self.prefix)
    }

    /// Idempotency key of a session cancellation.
    #[must_use]
    pub fn session_cancel(&self, session_id: &SessionId) -> String {
        format!("{}credit:session:cancel:{session_id}", self.prefix)
    }

    /// Cache key of a user's available balance.
    #[must_use]
    pub fn balance(&self, user_id: &UserId) -> String {
        format!("{}user_balance:{user_id}", self.prefix)
    }
}
