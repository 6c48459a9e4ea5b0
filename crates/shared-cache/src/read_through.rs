//! # Cache-Aside Read Layer
//!
//! `get_or_load` checks the store first. A hit returns the stored JSON text
//! verbatim, with no parse and re-serialize round trip. A miss runs the
//! loader, serializes its result once, stores it with the TTL and returns
//! the same text.
//!
//! Two concurrent misses on one key may both load and both write; the
//! writes carry equivalent values.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::store::CacheStore;

/// Where a response body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    Hit,
    Miss,
}

/// A JSON response body plus its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedJson {
    pub body: String,
    pub source: CacheSource,
}

impl CachedJson {
    pub fn is_hit(&self) -> bool {
        self.source == CacheSource::Hit
    }

    /// Parse the body, for callers that need the typed value.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Read-through cache over a [`CacheStore`].
#[derive(Clone)]
pub struct ReadThroughCache {
    store: Arc<dyn CacheStore>,
}

impl ReadThroughCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Return the cached body for `key`, or load, store and return it.
    ///
    /// A store read error is treated as a miss and a store write error is
    /// only logged; the loader's result is returned either way. Loader
    /// errors are returned untouched and nothing is cached.
    ///
    /// # Errors
    ///
    /// - the loader's error
    /// - `CacheError::Serialization` (converted into `E`) if the loaded value
    ///   cannot be encoded
    pub async fn get_or_load<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        loader: F,
    ) -> Result<CachedJson, E>
    where
        T: Serialize,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.store.get(key).await {
            Ok(Some(body)) => {
                social_telemetry::CACHE_LOOKUPS.with_label_values(&["hit"]).inc();
                debug!(key, "Cache hit");
                return Ok(CachedJson {
                    body,
                    source: CacheSource::Hit,
                });
            }
            Ok(None) => {
                social_telemetry::CACHE_LOOKUPS.with_label_values(&["miss"]).inc();
                debug!(key, "Cache miss");
            }
            Err(e) => {
                social_telemetry::CACHE_LOOKUPS.with_label_values(&["error"]).inc();
                warn!(key, error = %e, "Cache read failed, loading from store");
            }
        }

        let value = loader().await?;
        let body = serde_json::to_string(&value).map_err(CacheError::from)?;

        if let Err(e) = self.store.set_ex(key, body.clone(), ttl).await {
            warn!(key, error = %e, "Cache write failed");
        }

        Ok(CachedJson {
            body,
            source: CacheSource::Miss,
        })
    }
}
