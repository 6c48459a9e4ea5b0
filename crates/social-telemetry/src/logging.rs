//! Structured logging setup.
//!
//! Pretty output for development, JSON for containers. Every line carries the
//! target, so bus and cache events can be filtered with directives such as
//! `shared_bus=debug`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured level when both are present.
///
/// # Errors
///
/// - `TelemetryError::LoggingInit` - bad filter directive, or a global
///   subscriber is already installed
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Logging initialized"
    );

    Ok(())
}

/// Log an event-bus event with the standard correlation fields.
#[macro_export]
macro_rules! log_bus_event {
    ($level:ident, $msg:expr, $routing_key:expr, $message_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            routing_key = %$routing_key,
            message_id = %$message_id,
            $($($field)*,)?
            $msg
        )
    };
}
