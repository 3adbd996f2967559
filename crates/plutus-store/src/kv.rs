//! In-process cache/lock store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::{Result, StoreError};
use crate::KvStore;

/// Writes between two sweeps of expired keys.
const SWEEP_INTERVAL: usize = 256;

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, (String, Instant)>,
    writes: usize,
}

impl Entries {
    fn insert(&mut self, key: &str, value: &str, ttl: Duration, now: Instant) {
        self.writes += 1;
        if self.writes >= SWEEP_INTERVAL {
            self.map.retain(|_, (_, deadline)| *deadline > now);
            self.writes = 0;
        }
        self.map
            .insert(key.to_string(), (value.to_string(), now + ttl));
    }

    fn claim(&mut self, key: &str, value: &str, ttl: Duration, now: Instant) -> bool {
        if let Some((_, deadline)) = self.map.get(key) {
            if *deadline > now {
                return false;
            }
        }
        self.insert(key, value, ttl, now);
        true
    }
}

/// [`KvStore`] backed by a mutex-guarded map with per-key deadlines.
///
/// Only atomic within one process. Expired keys are dropped when they are
/// next touched, and swept from the whole map every few hundred writes.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<Entries>,
}

impl MemoryKv {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Entries>> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Cache("memory kv mutex poisoned".into()))
    }
}

impl KvStore for MemoryKv {
    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        Ok(self.lock()?.claim(key, value, ttl, Instant::now()))
    }

    fn set_if_absent_many(
        &self,
        keys: &[String],
        value: &str,
        ttl: Duration,
    ) -> Result<Vec<bool>> {
        let mut entries = self.lock()?;
        let now = Instant::now();
        Ok(keys
            .iter()
            .map(|key| entries.claim(key, value, ttl, now))
            .collect())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.lock()?;
        match entries.map.get(key) {
            Some((value, deadline)) if *deadline > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.map.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.lock()?.insert(key, value, ttl, Instant::now());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.map.remove(key);
        Ok(())
    }

    fn delete_many(&self, keys: &[String]) -> Result<()> {
        let mut entries = self.lock()?;
        for key in keys {
            entries.map.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn set_if_absent_claims_once() {
        let kv = MemoryKv::new();
        assert!(kv.set_if_absent("k", "1", TTL).unwrap());
        assert!(!kv.set_if_absent("k", "2", TTL).unwrap());
        assert_eq!(kv.get("k").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn expired_keys_can_be_reclaimed() {
        let kv = MemoryKv::new();
        assert!(kv.set_if_absent("k", "1", Duration::ZERO).unwrap());
        assert!(kv.get("k").unwrap().is_none());
        assert!(kv.set_if_absent("k", "2", TTL).unwrap());
    }

    #[test]
    fn batched_claim_reports_each_key() {
        let kv = MemoryKv::new();
        kv.set("b", "x", TTL).unwrap();
        let keys = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        let claimed = kv.set_if_absent_many(&keys, "1", TTL).unwrap();
        assert_eq!(claimed, vec![true, false, false]);
    }

    #[test]
    fn expired_keys_are_swept() {
        let kv = MemoryKv::new();
        for i in 0..1000 {
            assert!(kv.set_if_absent(&format!("k{i}"), "1", Duration::ZERO).unwrap());
        }
        kv.set("live", "1", TTL).unwrap();
        for i in 0..SWEEP_INTERVAL {
            kv.set(&format!("c{i}"), "1", Duration::ZERO).unwrap();
        }

        let held = kv.lock().unwrap().map.len();
        assert!(held <= SWEEP_INTERVAL, "held {held} entries");
        assert_eq!(kv.get("live").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn delete_releases_keys() {
        let kv = MemoryKv::new();
        kv.set("a", "1", TTL).unwrap();
        kv.set("b", "1", TTL).unwrap();
        kv.delete("a").unwrap();
        assert!(kv.get("a").unwrap().is_none());
        kv.delete_many(&["b".to_string(), "missing".to_string()]).unwrap();
        assert!(kv.get("b").unwrap().is_none());
    }
}
