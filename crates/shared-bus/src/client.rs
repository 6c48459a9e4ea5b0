//! # Bus Client
//!
//! Owns one broker channel per process and re-establishes it lazily.
//!
//! The channel lives behind an async mutex that doubles as the reconnect
//! guard: a caller that finds the channel closed reconnects while holding the
//! lock, and concurrent callers wait for that attempt instead of opening
//! their own connections.

use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::BusError;
use crate::transport::{Channel, ExchangeKind, Transport};

/// Well-known topic exchange shared by every service.
pub const DEFAULT_EXCHANGE: &str = "social_events";

/// Suffix of the dead-letter exchange derived from the main exchange.
pub const DEAD_LETTER_SUFFIX: &str = ".dlx";

/// Suffix of the durable queue that holds dead-lettered messages.
pub const DEAD_LETTER_QUEUE_SUFFIX: &str = ".dlq";

/// Bounded exponential backoff for (re)connecting.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Connection attempts per call before giving up.
    pub max_attempts: u32,
    /// Fraction of the delay that may be shaved off at random, in `[0, 1]`.
    pub jitter: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(200),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
            max_attempts: 5,
            jitter: 0.2,
        }
    }
}

impl ReconnectPolicy {
    /// Delay after the failed attempt number `attempt` (0-based), before jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_delay
        }
    }

    /// Delay with jitter applied. Never exceeds `max_delay`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 {
            return base;
        }
        let shave = rand::thread_rng().gen_range(0.0..=jitter);
        base.mul_f64(1.0 - shave)
    }
}

/// Connection settings for a [`BusClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct BusConfig {
    pub url: String,
    pub exchange: String,
    pub exchange_durable: bool,
    pub reconnect: ReconnectPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: "amqp://localhost:5672".to_string(),
            exchange: DEFAULT_EXCHANGE.to_string(),
            exchange_durable: false,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Process-wide handle on the broker.
///
/// Share it as `Arc<BusClient>` between the publisher and every consumer.
pub struct BusClient {
    transport: Arc<dyn Transport>,
    config: BusConfig,
    channel: Mutex<Option<Arc<dyn Channel>>>,
    generation: AtomicU64,
    closed: AtomicBool,
}

impl BusClient {
    /// Create a client without connecting. The first call to
    /// [`Self::channel`] connects.
    pub fn new(transport: Arc<dyn Transport>, config: BusConfig) -> Self {
        Self {
            transport,
            config,
            channel: Mutex::new(None),
            generation: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Create a client and establish its channel.
    ///
    /// # Errors
    ///
    /// - `BusError::Connection` - the broker stayed unreachable through every attempt
    /// - `BusError::PreconditionFailed` - the exchange exists with other settings
    pub async fn connect(
        transport: Arc<dyn Transport>,
        config: BusConfig,
    ) -> Result<Arc<Self>, BusError> {
        let client = Self::new(transport, config);
        client.channel().await?;
        Ok(Arc::new(client))
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn exchange(&self) -> &str {
        &self.config.exchange
    }

    pub fn dead_letter_exchange(&self) -> String {
        format!("{}{DEAD_LETTER_SUFFIX}", self.config.exchange)
    }

    /// Durable queue bound to [`Self::dead_letter_exchange`] with `#`.
    pub fn dead_letter_queue(&self) -> String {
        format!("{}{DEAD_LETTER_QUEUE_SUFFIX}", self.config.exchange)
    }

    /// Incremented every time a channel is established. Consumers compare it
    /// to notice that their queue and binding must be redeclared.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// The current channel, reconnecting first if it has closed.
    ///
    /// After the attempts run out the error is returned and the next call
    /// starts a fresh round of attempts.
    pub async fn channel(&self) -> Result<Arc<dyn Channel>, BusError> {
        if self.is_closed() {
            return Err(BusError::ClientClosed);
        }

        let mut current = self.channel.lock().await;
        if let Some(channel) = current.as_ref() {
            if channel.is_open() {
                return Ok(Arc::clone(channel));
            }
            warn!(exchange = %self.config.exchange, "Bus channel closed, reconnecting");
        }
        *current = None;

        let channel = self.establish_with_backoff().await?;
        *current = Some(Arc::clone(&channel));
        Ok(channel)
    }

    /// Tear the channel down. Later calls fail with `BusError::ClientClosed`.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut current = self.channel.lock().await;
        if let Some(channel) = current.take() {
            channel.close().await;
        }
        info!(exchange = %self.config.exchange, "Bus client closed");
    }

    async fn establish_with_backoff(&self) -> Result<Arc<dyn Channel>, BusError> {
        let policy = &self.config.reconnect;
        let max_attempts = policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            if self.is_closed() {
                return Err(BusError::ClientClosed);
            }

            match self.establish().await {
                Ok(channel) => {
                    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                    social_telemetry::BUS_RECONNECTS.inc();
                    info!(
                        exchange = %self.config.exchange,
                        generation,
                        attempt = attempt + 1,
                        "Bus channel established"
                    );
                    return Ok(channel);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    let delay = policy.delay(attempt);
                    warn!(
                        url = %self.config.url,
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Bus connection attempt failed"
                    );
                    last_error = Some(e);
                    if attempt + 1 < max_attempts {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        let reason = last_error.map_or_else(|| "no attempt made".to_string(), |e| e.to_string());
        Err(BusError::Connection(format!(
            "gave up after {max_attempts} attempts: {reason}"
        )))
    }

    async fn establish(&self) -> Result<Arc<dyn Channel>, BusError> {
        let channel = self.transport.connect(&self.config.url).await?;
        if let Err(e) = channel
            .assert_exchange(
                &self.config.exchange,
                ExchangeKind::Topic,
                self.config.exchange_durable,
            )
            .await
        {
            channel.close().await;
            return Err(e);
        }
        Ok(channel)
    }
}
