//! # Shared Cache
//!
//! Keeps hot-path reads consistent with each service's source of truth.
//!
//! - [`ReadThroughCache`]: cache-aside reads with TTL entries
//! - [`InvalidationCoordinator`]: clears item and list keys after a mutation
//! - [`CacheStore`]: Redis-style port; [`InMemoryCacheStore`] is the
//!   in-process adapter; `RedisCacheStore` (feature `redis`) talks to a
//!   Redis server
//!
//! ## Ordering
//!
//! Writers invalidate after their store write commits. A reader that loaded
//! just before the write can still repopulate a stale entry; the TTL bounds
//! how long it lives.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod invalidation;
pub mod keys;
pub mod read_through;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod store;

pub use error::CacheError;
pub use invalidation::{InvalidationCoordinator, InvalidationReport, InvalidationScope};
pub use keys::CacheTtls;
pub use read_through::{CacheSource, CachedJson, ReadThroughCache};
pub use store::{glob_match, CacheStore, InMemoryCacheStore, SWEEP_INTERVAL};

#[cfg(feature = "redis")]
pub use redis_store::RedisCacheStore;
