//! # Redis Cache Store
//!
//! [`CacheStore`] over a Redis server. Commands go through a
//! `ConnectionManager`, which reconnects on its own after a dropped
//! connection; a command issued while the server is down fails with
//! `CacheError::Connection` and the read-through layer falls back to the
//! loader.

use ::redis::aio::ConnectionManager;
use ::redis::{Client, RedisError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

use crate::error::CacheError;
use crate::store::CacheStore;

/// Keys requested per `SCAN` round trip.
const SCAN_COUNT: usize = 500;

pub struct RedisCacheStore {
    connection: ConnectionManager,
}

impl RedisCacheStore {
    /// Open a managed connection to `url` (`redis://host:port/db`).
    ///
    /// # Errors
    ///
    /// - `CacheError::Connection` - malformed URL or server unreachable
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(connection_error)?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(connection_error)?;
        info!("Connected to Redis cache store");
        Ok(Self { connection })
    }
}

fn connection_error(e: RedisError) -> CacheError {
    CacheError::Connection(e.to_string())
}

/// `PX` argument; Redis rejects a zero expiry.
fn px_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut connection = self.connection.clone();
        ::redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut connection)
            .await
            .map_err(connection_error)
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        ::redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(px_millis(ttl))
            .query_async::<_, ()>(&mut connection)
            .await
            .map_err(connection_error)
    }

    async fn del(&self, keys: &[String]) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut connection = self.connection.clone();
        ::redis::cmd("DEL")
            .arg(keys.to_vec())
            .query_async::<_, u64>(&mut connection)
            .await
            .map_err(connection_error)
    }

    /// Cursor-based `SCAN ... MATCH`, so a large keyspace never blocks the
    /// server the way `KEYS` would.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut connection = self.connection.clone();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = ::redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut connection)
                .await
                .map_err(connection_error)?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once.
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}
