//! Engine tunables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const MAX_FREEZE_TTL_SECONDS: i64 = 100 * 365 * 24 * 60 * 60;

/// Engine configuration.
///
/// Durations are whole seconds so the struct can be loaded from flat
/// environment or file configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Namespace prepended to every cache/lock key.
    pub key_prefix: String,

    /// How long an idempotency claim lives (default: 24h).
    pub idempotency_ttl_seconds: u64,

    /// How long a cached balance lives (default: 5 min).
    pub balance_cache_ttl_seconds: u64,

    /// Hold duration of a session freeze (default: 24h).
    pub freeze_ttl_seconds: u64,
}

impl EngineConfig {
    /// Idempotency claim TTL.
    #[must_use]
    pub const fn idempotency_ttl(&self) -> Duration {
        Duration::from_secs(self.idempotency_ttl_seconds)
    }

    /// Balance cache TTL.
    #[must_use]
    pub const fn balance_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.balance_cache_ttl_seconds)
    }

    /// Session hold duration, capped at one hundred years.
    #[must_use]
    pub fn freeze_ttl(&self) -> chrono::Duration {
        let seconds = i64::try_from(self.freeze_ttl_seconds)
            .unwrap_or(i64::MAX)
            .min(MAX_FREEZE_TTL_SECONDS);
        chrono::Duration::seconds(seconds)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            key_prefix: String::new(),
            idempotency_ttl_seconds: 24 * 60 * 60,
            balance_cache_ttl_seconds: 5 * 60,
            freeze_ttl_seconds: 24 * 60 * 60,
        }
    }
}
