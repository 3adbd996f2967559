//! Redis cache/lock store.

use std::time::Duration;

use crate::error::{Result, StoreError};
use crate::KvStore;

fn cache_err(err: redis::RedisError) -> StoreError {
    StoreError::Cache(err.to_string())
}

/// TTL in whole seconds, at least one (`EX 0` is rejected by Redis).
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// [`KvStore`] on a shared Redis instance.
///
/// Claims use `SET key value NX EX ttl`, which Redis executes atomically,
/// so every engine process pointed at the same Redis sees one winner.
pub struct RedisKv {
    client: redis::Client,
}

impl RedisKv {
    /// Create a client for `url` (e.g. `redis://127.0.0.1/`).
    ///
    /// No connection is made until the first command.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed.
    pub fn open(url: &str) -> Result<Self> {
        Ok(Self {
            client: redis::Client::open(url).map_err(cache_err)?,
        })
    }

    fn connection(&self) -> Result<redis::Connection> {
        self.client.get_connection().map_err(cache_err)
    }
}

impl KvStore for RedisKv {
    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.connection()?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query(&mut conn)
            .map_err(cache_err)?;
        Ok(reply.is_some())
    }

    fn set_if_absent_many(
        &self,
        keys: &[String],
        value: &str,
        ttl: Duration,
    ) -> Result<Vec<bool>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection()?;
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.cmd("SET")
                .arg(key)
                .arg(value)
                .arg("NX")
                .arg("EX")
                .arg(ttl_secs(ttl));
        }
        let replies: Vec<Option<String>> = pipe.query(&mut conn).map_err(cache_err)?;
        Ok(replies.into_iter().map(|r| r.is_some()).collect())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection()?;
        redis::cmd("GET")
            .arg(key)
            .query(&mut conn)
            .map_err(cache_err)
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.connection()?;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query(&mut conn)
            .map_err(cache_err)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection()?;
        let _: () = redis::cmd("DEL")
            .arg(key)
            .query(&mut conn)
            .map_err(cache_err)?;
        Ok(())
    }

    fn delete_many(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection()?;
        let _: () = redis::cmd("DEL")
            .arg(keys)
            .query(&mut conn)
            .map_err(cache_err)?;
        Ok(())
    }
}
