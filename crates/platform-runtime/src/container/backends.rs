//! # Infrastructure Backends
//!
//! Picks the broker transport and cache store from the URL scheme:
//!
//! | Scheme | Bus | Cache |
//! |--------|-----|-------|
//! | `memory://` | [`InMemoryBroker`] | [`InMemoryCacheStore`] |
//! | `amqp://`, `amqps://` | `AmqpTransport` (feature `amqp`) | - |
//! | `redis://`, `rediss://` | - | `RedisCacheStore` (feature `redis`) |
//!
//! The in-process backends only connect services that run in the same
//! process.

use shared_bus::{InMemoryBroker, Transport};
use shared_cache::{CacheError, CacheStore, InMemoryCacheStore};
use std::sync::Arc;
use tracing::{info, warn};

use super::config::{BusSettings, CacheSettings, ConfigError};

const MEMORY_SCHEME: &str = "memory://";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusBackend {
    Memory,
    Amqp,
}

impl BusBackend {
    /// # Errors
    ///
    /// - `ConfigError::UnsupportedScheme` - neither `memory://` nor `amqp(s)://`
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        if url.starts_with(MEMORY_SCHEME) {
            Ok(Self::Memory)
        } else if url.starts_with("amqp://") || url.starts_with("amqps://") {
            Ok(Self::Amqp)
        } else {
            Err(ConfigError::UnsupportedScheme {
                var: "SP_BUS_URL",
                url: url.to_string(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Memory,
    Redis,
}

impl CacheBackend {
    /// # Errors
    ///
    /// - `ConfigError::UnsupportedScheme` - neither `memory://` nor `redis(s)://`
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        if url.starts_with(MEMORY_SCHEME) {
            Ok(Self::Memory)
        } else if url.starts_with("redis://") || url.starts_with("rediss://") {
            Ok(Self::Redis)
        } else {
            Err(ConfigError::UnsupportedScheme {
                var: "SP_CACHE_URL",
                url: url.to_string(),
            })
        }
    }
}

/// Transport for `settings.url`. Connecting happens later, in the bus client.
pub fn transport(settings: &BusSettings) -> Result<Arc<dyn Transport>, ConfigError> {
    match BusBackend::from_url(&settings.url)? {
        BusBackend::Memory => {
            warn!("Using the in-process broker; events stay inside this process");
            Ok(Arc::new(InMemoryBroker::new()))
        }
        BusBackend::Amqp => amqp_transport(&settings.url),
    }
}

#[cfg(feature = "amqp")]
fn amqp_transport(_url: &str) -> Result<Arc<dyn Transport>, ConfigError> {
    info!("Using the AMQP broker transport");
    Ok(Arc::new(shared_bus::AmqpTransport::new()))
}

#[cfg(not(feature = "amqp"))]
fn amqp_transport(url: &str) -> Result<Arc<dyn Transport>, ConfigError> {
    Err(ConfigError::BackendDisabled {
        url: url.to_string(),
        feature: "amqp",
    })
}

#[derive(Debug, thiserror::Error)]
pub enum CacheBackendError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] CacheError),
}

/// Cache store for `settings.url`, connected.
pub async fn cache_store(
    settings: &CacheSettings,
) -> Result<Arc<dyn CacheStore>, CacheBackendError> {
    match CacheBackend::from_url(&settings.url)? {
        CacheBackend::Memory => {
            warn!("Using the in-process cache store; entries are not shared");
            Ok(Arc::new(InMemoryCacheStore::new()))
        }
        CacheBackend::Redis => redis_store(&settings.url).await,
    }
}

#[cfg(feature = "redis")]
async fn redis_store(url: &str) -> Result<Arc<dyn CacheStore>, CacheBackendError> {
    let store = shared_cache::RedisCacheStore::connect(url).await?;
    info!("Using the Redis cache store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis"))]
async fn redis_store(url: &str) -> Result<Arc<dyn CacheStore>, CacheBackendError> {
    Err(ConfigError::BackendDisabled {
        url: url.to_string(),
        feature: "redis",
    }
    .into())
}
