//! Available balance aggregation with a read-through cache.
//!
//! Cached values are stored as `<balance>|<valid_until_ms>`. The horizon is
//! the earlier of the cache TTL and the next ledger or freeze expiry, since
//! the balance changes at that instant without any write to invalidate it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use plutus_core::{CreditError, Decimal, Result, UserId};
use plutus_store::{KvStore, Store};

use crate::keys::KeyBuilder;

/// Computes `Σ available ledger − Σ active freezes` and caches the result.
///
/// The cache is advisory: a miss, an unreadable or outdated value, and an
/// unreachable cache all fall back to storage. Invalidation failures do
/// propagate, since a stale cached balance would outlive the mutation that
/// changed it.
#[derive(Clone)]
pub struct BalanceAggregator {
    kv: Arc<dyn KvStore>,
    keys: KeyBuilder,
    ttl: Duration,
}

/// A balance together with the instant it stops being accurate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CachedBalance {
    balance: Decimal,
    valid_until: DateTime<Utc>,
}

impl CachedBalance {
    fn encode(&self) -> String {
        format!("{}|{}", self.balance, self.valid_until.timestamp_millis())
    }

    fn decode(raw: &str) -> Option<Self> {
        let (balance, valid_until) = raw.split_once('|')?;
        Some(Self {
            balance: balance.parse().ok()?,
            valid_until: Utc
                .timestamp_millis_opt(valid_until.parse().ok()?)
                .single()?,
        })
    }
}

impl BalanceAggregator {
    /// Create an aggregator caching balances for at most `ttl`.
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>, keys: KeyBuilder, ttl: Duration) -> Self {
        Self { kv, keys, ttl }
    }

    /// Available balance of `user_id` at `now`.
    ///
    /// # Errors
    ///
    /// Returns `CreditError::Storage` if the aggregates cannot be read.
    pub fn available_balance<S: Store>(
        &self,
        store: &S,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Decimal> {
        if let Some(balance) = self.cached(user_id, now) {
            return Ok(balance);
        }
        self.refresh(store, user_id, now)
    }

    /// Fail with `INSUFFICIENT_BALANCE` unless `required` is available.
    ///
    /// A cached shortfall is confirmed against storage before rejecting.
    ///
    /// # Errors
    ///
    /// Returns `CreditError::InsufficientBalance`, or `CreditError::Storage`
    /// if the aggregates cannot be read.
    pub fn ensure_available<S: Store>(
        &self,
        store: &S,
        user_id: &UserId,
        required: Decimal,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self
            .cached(user_id, now)
            .is_some_and(|balance| balance >= required)
        {
            return Ok(());
        }
        let available = self.refresh(store, user_id, now)?;
        if available < required {
            return Err(CreditError::InsufficientBalance {
                available,
                required,
            });
        }
        Ok(())
    }

    /// Balance straight from storage, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns `CreditError::Storage` if the aggregates cannot be read.
    pub fn compute<S: Store>(store: &S, user_id: &UserId, now: DateTime<Utc>) -> Result<Decimal> {
        let ledger = store.sum_available_ledger(user_id, now)?;
        let frozen = store.sum_active_freezes(user_id, now)?;
        Ok(ledger - frozen)
    }

    /// Drop the cached balance of `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `CreditError::Cache` if the cache cannot be reached.
    pub fn invalidate(&self, user_id: &UserId) -> Result<()> {
        Ok(self.kv.delete(&self.keys.balance(user_id))?)
    }

    /// Drop the cached balances of all `user_ids` in one round-trip.
    ///
    /// # Errors
    ///
    /// Returns `CreditError::Cache` if the cache cannot be reached.
    pub fn invalidate_many<'a>(&self, user_ids: impl IntoIterator<Item = &'a UserId>) -> Result<()> {
        let keys: Vec<String> = user_ids.into_iter().map(|u| self.keys.balance(u)).collect();
        if keys.is_empty() {
            return Ok(());
        }
        Ok(self.kv.delete_many(&keys)?)
    }

    fn cached(&self, user_id: &UserId, now: DateTime<Utc>) -> Option<Decimal> {
        match self.kv.get(&self.keys.balance(user_id)) {
            Ok(Some(raw)) => match CachedBalance::decode(&raw) {
                Some(cached) if cached.valid_until > now => return Some(cached.balance),
                Some(_) => tracing::debug!(user_id = %user_id, "Cached balance outlived an expiry"),
                None => tracing::warn!(user_id = %user_id, "Discarding unparsable cached balance"),
            },
            Ok(None) => tracing::debug!(user_id = %user_id, "Balance cache miss"),
            Err(e) => tracing::warn!(user_id = %user_id, error = %e, "Balance cache unavailable"),
        }
        None
    }

    /// Recompute from storage and cache the result until it can next change.
    fn refresh<S: Store>(&self, store: &S, user_id: &UserId, now: DateTime<Utc>) -> Result<Decimal> {
        let balance = Self::compute(store, user_id, now)?;
        let next_expiry = store.next_expiry(user_id, now)?;

        let horizon = chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl));
        let Some(valid_until) = horizon.into_iter().chain(next_expiry).min() else {
            return Ok(balance);
        };
        let Some(ttl) = (valid_until - now).to_std().ok().filter(|ttl| !ttl.is_zero()) else {
            return Ok(balance);
        };

        let entry = CachedBalance {
            balance,
            valid_until,
        };
        if let Err(e) = self.kv.set(&self.keys.balance(user_id), &entry.encode(), ttl) {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to cache balance");
        }
        Ok(balance)
    }
}
