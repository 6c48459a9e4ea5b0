//! # Test Fixtures
//!
//! Boots the whole platform on an [`InMemoryBroker`] and an
//! [`InMemoryCacheStore`] driven by a manual clock.

use async_trait::async_trait;
use parking_lot::Mutex;
use platform_runtime::container::PlatformConfig;
use platform_runtime::PlatformRuntime;
use shared_bus::{
    BusClient, BusConfig, BusPublisher, ConsumerStats, DomainEvent, EventHandler, EventPublisher,
    HandlerError, InMemoryBroker, ReconnectPolicy, SubscriptionHandle,
};
use shared_cache::InMemoryCacheStore;
use shared_types::time::ManualTimeSource;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on any wait for an event to be handled.
pub const WAIT: Duration = Duration::from_secs(5);

/// Reconnect policy that gives up within a few milliseconds.
pub fn fast_reconnect() -> ReconnectPolicy {
    ReconnectPolicy {
        initial_delay: Duration::from_millis(2),
        multiplier: 2.0,
        max_delay: Duration::from_millis(20),
        max_attempts: 3,
        jitter: 0.0,
    }
}

pub fn fast_config() -> PlatformConfig {
    let mut config = PlatformConfig::default();
    config.bus.url = "amqp://test".to_string();
    config.bus.reconnect = fast_reconnect();
    config
}

pub struct Platform {
    pub broker: InMemoryBroker,
    pub clock: Arc<ManualTimeSource>,
    pub cache: Arc<InMemoryCacheStore>,
    pub runtime: PlatformRuntime,
}

impl Platform {
    pub async fn start() -> Self {
        Self::start_with(fast_config()).await
    }

    pub async fn start_with(config: PlatformConfig) -> Self {
        let broker = InMemoryBroker::new();
        let clock = Arc::new(ManualTimeSource::new(1_000_000));
        let cache = Arc::new(InMemoryCacheStore::with_clock(clock.clone()));
        let runtime = PlatformRuntime::start(config, Arc::new(broker.clone()), cache.clone())
            .await
            .expect("platform starts");
        Self {
            broker,
            clock,
            cache,
            runtime,
        }
    }

    pub fn subscription(&self, handler: &str) -> &SubscriptionHandle {
        self.runtime
            .subscription(handler)
            .unwrap_or_else(|| panic!("no subscription for {handler}"))
    }

    /// Publisher on its own client, standing in for another process.
    pub async fn external_publisher(&self) -> BusPublisher {
        BusPublisher::new(bus_client(&self.broker).await)
    }

    pub async fn shutdown(self) {
        self.runtime.shutdown().await;
    }
}

pub async fn bus_client(broker: &InMemoryBroker) -> Arc<BusClient> {
    let config = BusConfig {
        url: "amqp://test".to_string(),
        reconnect: fast_reconnect(),
        ..BusConfig::default()
    };
    BusClient::connect(Arc::new(broker.clone()), config)
        .await
        .expect("bus client connects")
}

pub async fn publish<T: serde::Serialize>(
    publisher: &dyn EventPublisher,
    routing_key: &str,
    payload: &T,
) {
    let event = DomainEvent::new(routing_key, payload).expect("payload serializes");
    publisher.publish(event).await.expect("broker accepts event");
}

/// Wait until `handle`'s counters satisfy `predicate`, failing the test
/// after [`WAIT`].
pub async fn wait_for(
    handle: &SubscriptionHandle,
    predicate: impl FnMut(&ConsumerStats) -> bool,
) -> ConsumerStats {
    tokio::time::timeout(WAIT, handle.wait_until(predicate))
        .await
        .unwrap_or_else(|_| panic!("{} did not reach the expected state", handle.handler()))
}

// =============================================================================
// TEST HANDLERS
// =============================================================================

/// Records every event and fails the first `failures` calls.
pub struct ScriptedHandler {
    name: String,
    failures: AtomicU32,
    calls: AtomicU32,
    seen: Mutex<Vec<DomainEvent>>,
}

impl ScriptedHandler {
    pub fn new(name: &str, failures: u32) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            failures: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn ok(name: &str) -> Arc<Self> {
        Self::new(name, 0)
    }

    pub fn always_failing(name: &str) -> Arc<Self> {
        Self::new(name, u32::MAX)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<DomainEvent> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl EventHandler for ScriptedHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(event.clone());
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(HandlerError::Failed("scripted failure".to_string()));
        }
        Ok(())
    }
}
