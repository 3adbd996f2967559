//! Claim-and-replay guard around mutating operations.
//!
//! A request key is claimed with an atomic set-if-absent before the
//! operation runs. A second request with the same key never re-executes: it
//! is answered from the journal, or rejected when the journal has nothing
//! for it yet. The claim TTL bounds how long a crashed request blocks
//! retries.

use std::sync::Arc;
use std::time::Duration;

use plutus_core::{CreditError, Result};
use plutus_store::KvStore;

/// Outcome of [`IdempotencyGuard::claim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// This caller owns the key and must run the operation.
    Acquired,
    /// Another request holds or held the key.
    AlreadyClaimed,
}

/// Idempotency guard backed by the shared cache/lock store.
#[derive(Clone)]
pub struct IdempotencyGuard {
    kv: Arc<dyn KvStore>,
    ttl: Duration,
}

const CLAIM_VALUE: &str = "1";

impl IdempotencyGuard {
    /// Create a guard whose claims expire after `ttl`.
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    /// Atomically claim `key`.
    ///
    /// # Errors
    ///
    /// Returns `CreditError::Cache` if the cache/lock store is unreachable.
    pub fn claim(&self, key: &str) -> Result<Claim> {
        if self.kv.set_if_absent(key, CLAIM_VALUE, self.ttl)? {
            Ok(Claim::Acquired)
        } else {
            Ok(Claim::AlreadyClaimed)
        }
    }

    /// Claim many keys in one round-trip; `true` where freshly claimed.
    ///
    /// # Errors
    ///
    /// Returns `CreditError::Cache` if the cache/lock store is unreachable.
    pub fn claim_many(&self, keys: &[String]) -> Result<Vec<bool>> {
        Ok(self.kv.set_if_absent_many(keys, CLAIM_VALUE, self.ttl)?)
    }

    /// Release a claim, best-effort.
    ///
    /// A failed release leaves the key to expire with its TTL.
    pub fn release(&self, key: &str) {
        if let Err(e) = self.kv.delete(key) {
            tracing::warn!(
                key = %key,
                ttl_seconds = self.ttl.as_secs(),
                error = %e,
                "Failed to release idempotency key; retries blocked until it expires"
            );
        }
    }

    /// Release many claims in one round-trip, best-effort.
    pub fn release_many(&self, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        if let Err(e) = self.kv.delete_many(keys) {
            tracing::warn!(
                count = keys.len(),
                error = %e,
                "Failed to release idempotency keys; retries blocked until they expire"
            );
        }
    }

    /// Run `op` under `key`, replaying from the journal when already claimed.
    ///
    /// `replay` looks up the journaled result of a completed request. It is
    /// consulted when the key is already claimed, and again when `op` fails:
    /// if the result was journaled before the failure the key is kept, so a
    /// retry replays instead of executing twice.
    ///
    /// # Errors
    ///
    /// Returns `DUPLICATE_REQUEST` when the key is claimed but nothing is
    /// journaled, or the error of `op`.
    pub fn run<T, R, F>(&self, key: &str, replay: R, op: F) -> Result<T>
    where
        R: Fn() -> Result<Option<T>>,
        F: FnOnce() -> Result<T>,
    {
        match self.claim(key)? {
            Claim::AlreadyClaimed => {
                if let Some(previous) = replay()? {
                    tracing::debug!(key = %key, "Replaying completed request");
                    return Ok(previous);
                }
                tracing::warn!(key = %key, "Idempotency key claimed but no journal record found");
                Err(CreditError::DuplicateRequest {
                    key: key.to_string(),
                })
            }
            Claim::Acquired => op().map_err(|err| {
                self.abandon(key, || Ok(replay()?.is_some()));
                err
            }),
        }
    }

    /// Run `op` under `key`, or do nothing when the key is already claimed.
    ///
    /// Returns `None` for the skipped case. `journaled` tells whether the
    /// operation's record exists, deciding whether a failed run keeps its key.
    ///
    /// # Errors
    ///
    /// Returns the error of `op`.
    pub fn run_once<T, J, F>(&self, key: &str, journaled: J, op: F) -> Result<Option<T>>
    where
        J: FnOnce() -> Result<bool>,
        F: FnOnce() -> Result<T>,
    {
        match self.claim(key)? {
            Claim::AlreadyClaimed => {
                tracing::debug!(key = %key, "Request already handled; skipping");
                Ok(None)
            }
            Claim::Acquired => op().map(Some).map_err(|err| {
                self.abandon(key, journaled);
                err
            }),
        }
    }

    fn abandon(&self, key: &str, journaled: impl FnOnce() -> Result<bool>) {
        match journaled() {
            Ok(true) => {
                tracing::debug!(key = %key, "Operation journaled before failing; keeping key");
            }
            Ok(false) => self.release(key),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Could not check journal; releasing key");
                self.release(key);
            }
        }
    }
}
