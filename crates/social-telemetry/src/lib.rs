//! # Social Telemetry
//!
//! Logging bootstrap and Prometheus metrics shared by every service.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use social_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_telemetry(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SP_SERVICE_NAME` | `social-platform` | Service name in logs |
//! | `SP_LOG_LEVEL` | `info` | Log level filter (`RUST_LOG` also honoured) |
//! | `SP_JSON_LOGS` | `false` | JSON output (defaults on inside containers) |

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, BUS_RECONNECTS, CACHE_INVALIDATED_KEYS,
    CACHE_INVALIDATION_FAILURES, CACHE_LOOKUPS, EVENTS_CONSUMED, EVENTS_PUBLISHED,
    HANDLER_DURATION, MEDIA_CLEANUP, PUBLISH_FAILURES, REGISTRY,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Register metrics, then install the global log subscriber.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    register_metrics()?;
    init_logging(config)
}
