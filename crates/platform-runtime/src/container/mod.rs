//! # Service Container
//!
//! Holds every service instance and the infrastructure it shares.
//!
//! - One [`shared_bus::BusClient`] per service, as each service is its own
//!   process in a deployment
//! - One cache store shared by all services

pub mod backends;
pub mod config;
pub mod services;

pub use backends::{BusBackend, CacheBackend, CacheBackendError};
pub use config::{
    BusSettings, CacheSettings, ConfigError, PlatformConfig, QueueModeSetting, DEFAULT_CACHE_URL,
};
pub use services::PlatformContainer;
