//! # Platform Configuration
//!
//! Typed defaults, overridden from `SP_*` environment variables.

use shared_bus::{
    BusConfig, ConsumerConfig, PoisonPolicy, ReconnectPolicy, Subscription, DEFAULT_EXCHANGE,
    DEFAULT_MAX_DELIVERIES,
};
use shared_cache::CacheTtls;

use super::backends::{BusBackend, CacheBackend};
use social_telemetry::TelemetryConfig;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },

    #[error("exchange name must not be empty")]
    EmptyExchange,

    #[error("max deliveries must be at least 1")]
    ZeroMaxDeliveries,

    #[error("reconnect attempts must be at least 1")]
    ZeroReconnectAttempts,

    #[error("initial backoff {initial:?} exceeds max backoff {max:?}")]
    BackoffRange { initial: Duration, max: Duration },

    #[error("cache TTLs must be non-zero")]
    ZeroTtl,

    #[error("unsupported URL scheme in {var}: {url}")]
    UnsupportedScheme { var: &'static str, url: String },

    #[error("{url} needs the `{feature}` feature")]
    BackendDisabled { url: String, feature: &'static str },
}

/// Exclusive queue per instance, or one durable queue per service type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueModeSetting {
    #[default]
    Exclusive,
    Shared,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BusSettings {
    pub url: String,
    pub exchange: String,
    pub exchange_durable: bool,
    pub queue_mode: QueueModeSetting,
    pub max_deliveries: u32,
    /// Republish poison messages to `<exchange>.dlx`; otherwise drop them.
    pub dead_letter: bool,
    pub reconnect: ReconnectPolicy,
}

impl Default for BusSettings {
    fn default() -> Self {
        let bus = BusConfig::default();
        Self {
            url: bus.url,
            exchange: bus.exchange,
            exchange_durable: bus.exchange_durable,
            queue_mode: QueueModeSetting::Exclusive,
            max_deliveries: DEFAULT_MAX_DELIVERIES,
            dead_letter: true,
            reconnect: bus.reconnect,
        }
    }
}

impl BusSettings {
    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            url: self.url.clone(),
            exchange: self.exchange.clone(),
            exchange_durable: self.exchange_durable,
            reconnect: self.reconnect.clone(),
        }
    }

    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig {
            max_deliveries: self.max_deliveries,
            poison_policy: if self.dead_letter {
                PoisonPolicy::DeadLetter
            } else {
                PoisonPolicy::Drop
            },
        }
    }

    /// Subscription for `pattern` owned by `service`. In shared mode the
    /// queue is named `<service>.<pattern>`.
    pub fn subscription(&self, service: &str, pattern: &str) -> Subscription {
        match self.queue_mode {
            QueueModeSetting::Exclusive => Subscription::exclusive(pattern),
            QueueModeSetting::Shared => Subscription::shared(pattern, format!("{service}.{pattern}")),
        }
    }
}

/// Default cache store location.
pub const DEFAULT_CACHE_URL: &str = "redis://127.0.0.1:6379";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// `redis://...`, or `memory://` for the in-process store.
    pub url: String,
    pub ttls: CacheTtls,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_CACHE_URL.to_string(),
            ttls: CacheTtls::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlatformConfig {
    pub bus: BusSettings,
    pub cache: CacheSettings,
    pub telemetry: TelemetryConfig,
}

impl PlatformConfig {
    /// Load configuration from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `SP_BUS_URL`: broker URL, `amqp://...` or `memory://`
    /// - `SP_CACHE_URL`: cache URL, `redis://...` or `memory://`
    /// - `SP_BUS_EXCHANGE`: topic exchange name (default: social_events)
    /// - `SP_BUS_DURABLE`: declare the exchange durable (default: false)
    /// - `SP_BUS_QUEUE_MODE`: `exclusive` or `shared` (default: exclusive)
    /// - `SP_MAX_DELIVERIES`: deliveries before dead-lettering (default: 2)
    /// - `SP_DEAD_LETTER`: dead-letter poison messages instead of dropping
    ///   them (default: true)
    /// - `SP_RECONNECT_INITIAL_MS`, `SP_RECONNECT_MAX_MS`,
    ///   `SP_RECONNECT_ATTEMPTS`: reconnect backoff
    /// - `SP_POST_TTL_SECS`, `SP_POST_LIST_TTL_SECS`, `SP_SEARCH_TTL_SECS`:
    ///   cache TTLs
    /// - telemetry variables, see [`TelemetryConfig::from_env`]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok(), TelemetryConfig::from_env())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        telemetry: TelemetryConfig,
    ) -> Result<Self, ConfigError> {
        let mut config = Self {
            telemetry,
            ..Self::default()
        };
        let bus = &mut config.bus;

        if let Some(url) = lookup("SP_BUS_URL") {
            bus.url = url;
        }
        if let Some(exchange) = lookup("SP_BUS_EXCHANGE") {
            bus.exchange = exchange;
        }
        if let Some(durable) = parse_bool(&lookup, "SP_BUS_DURABLE")? {
            bus.exchange_durable = durable;
        }
        if let Some(mode) = lookup("SP_BUS_QUEUE_MODE") {
            bus.queue_mode = match mode.to_lowercase().as_str() {
                "exclusive" => QueueModeSetting::Exclusive,
                "shared" => QueueModeSetting::Shared,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "SP_BUS_QUEUE_MODE",
                        value: mode,
                    })
                }
            };
        }
        if let Some(max) = parse_num::<u32>(&lookup, "SP_MAX_DELIVERIES")? {
            bus.max_deliveries = max;
        }
        if let Some(dead_letter) = parse_bool(&lookup, "SP_DEAD_LETTER")? {
            bus.dead_letter = dead_letter;
        }
        if let Some(ms) = parse_num::<u64>(&lookup, "SP_RECONNECT_INITIAL_MS")? {
            bus.reconnect.initial_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_num::<u64>(&lookup, "SP_RECONNECT_MAX_MS")? {
            bus.reconnect.max_delay = Duration::from_millis(ms);
        }
        if let Some(attempts) = parse_num::<u32>(&lookup, "SP_RECONNECT_ATTEMPTS")? {
            bus.reconnect.max_attempts = attempts;
        }

        if let Some(url) = lookup("SP_CACHE_URL") {
            config.cache.url = url;
        }

        let ttls = &mut config.cache.ttls;
        if let Some(secs) = parse_num::<u64>(&lookup, "SP_POST_TTL_SECS")? {
            ttls.post = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_num::<u64>(&lookup, "SP_POST_LIST_TTL_SECS")? {
            ttls.post_list = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_num::<u64>(&lookup, "SP_SEARCH_TTL_SECS")? {
            ttls.search = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Reject values the bus or cache layer cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bus = &self.bus;
        BusBackend::from_url(&bus.url)?;
        CacheBackend::from_url(&self.cache.url)?;
        if bus.exchange.trim().is_empty() {
            return Err(ConfigError::EmptyExchange);
        }
        if bus.max_deliveries == 0 {
            return Err(ConfigError::ZeroMaxDeliveries);
        }
        if bus.reconnect.max_attempts == 0 {
            return Err(ConfigError::ZeroReconnectAttempts);
        }
        if bus.reconnect.initial_delay > bus.reconnect.max_delay {
            return Err(ConfigError::BackoffRange {
                initial: bus.reconnect.initial_delay,
                max: bus.reconnect.max_delay,
            });
        }
        let ttls = &self.cache.ttls;
        if [ttls.post, ttls.post_list, ttls.search].contains(&Duration::ZERO) {
            return Err(ConfigError::ZeroTtl);
        }
        Ok(())
    }
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<bool>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => match value.to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Some(true)),
            "false" | "0" | "no" => Ok(Some(false)),
            _ => Err(ConfigError::Invalid { var, value }),
        },
    }
}

fn parse_num<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
