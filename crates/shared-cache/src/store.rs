//! # Cache Store Port
//!
//! The subset of a Redis client the cache layer uses, plus an in-process
//! implementation with TTL entries.

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::time::{SystemTimeSource, TimeSource, Timestamp};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::CacheError;

/// Key/value store with per-key expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Value stored under `key`, unless missing or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key`, replacing any previous value and TTL.
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Delete keys; returns how many existed.
    async fn del(&self, keys: &[String]) -> Result<u64, CacheError>;

    /// Live keys matching a glob pattern (`*`, `?`, `\` escapes).
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;
}

/// Redis-style glob match over the whole key.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();
    glob_match_chars(&pattern, &key)
}

fn glob_match_chars(pattern: &[char], key: &[char]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some(('*', rest)) => (0..=key.len()).any(|skip| glob_match_chars(rest, &key[skip..])),
        Some(('?', rest)) => !key.is_empty() && glob_match_chars(rest, &key[1..]),
        Some(('\\', rest)) if !rest.is_empty() => {
            key.first() == Some(&rest[0]) && glob_match_chars(&rest[1..], &key[1..])
        }
        Some((c, rest)) => key.first() == Some(c) && glob_match_chars(rest, &key[1..]),
    }
}

/// Writes between two full sweeps of expired entries.
pub const SWEEP_INTERVAL: u64 = 1024;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Timestamp,
}

impl Entry {
    fn is_live(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }
}

/// In-process TTL store.
///
/// Expired entries read as missing. They are removed when read, on every key
/// scan, and in a full sweep every [`SWEEP_INTERVAL`] writes. Time comes from
/// the injected [`TimeSource`].
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, Entry>>,
    clock: Arc<dyn TimeSource>,
    available: AtomicBool,
    writes: AtomicU64,
}

impl InMemoryCacheStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemTimeSource))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn TimeSource>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            available: AtomicBool::new(true),
            writes: AtomicU64::new(0),
        }
    }

    /// Simulate an outage: every operation fails with `CacheError::Connection`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Remaining time to live of a live key.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        self.entries
            .read()
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| Duration::from_millis(e.expires_at - now))
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of stored entries, expired ones included until reclaimed.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), CacheError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::Connection("cache store unavailable".to_string()))
        }
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check_available()?;
        let now = self.clock.now();

        if let Some(entry) = self.entries.read().get(key) {
            if entry.is_live(now) {
                return Ok(Some(entry.value.clone()));
            }
        } else {
            return Ok(None);
        }

        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.check_available()?;
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let expires_at = self.clock.now().saturating_add(ttl_ms);
        self.entries
            .write()
            .insert(key.to_string(), Entry { value, expires_at });

        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_INTERVAL == 0 {
            self.purge_expired();
        }
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64, CacheError> {
        self.check_available()?;
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let mut deleted = 0;
        for key in keys {
            if let Some(entry) = entries.remove(key) {
                if entry.is_live(now) {
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }

    /// Scans the whole map, so expired entries are reclaimed here.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        self.check_available()?;
        let now = self.clock.now();
        let mut entries = self.entries.write();
        entries.retain(|_, entry| entry.is_live(now));
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}
