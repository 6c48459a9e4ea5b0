//! # Event Consumer
//!
//! Durable subscriptions with an explicit acknowledgment discipline.
//!
//! Each subscription runs in its own task and processes deliveries one at a
//! time: the handler finishes, then its result is turned into an
//! [`AckDecision`] and applied on the channel.
//!
//! ```text
//! delivery ──▶ handler ──▶ Ok ────────────────────────────▶ ack
//!                     └──▶ Err, count < max_deliveries ──▶ nack(requeue)
//!                     └──▶ Err, final delivery ─────────▶ dead-letter, ack
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

use crate::client::BusClient;
use crate::error::{BusError, HandlerError};
use crate::events::DomainEvent;
use crate::transport::{Channel, Delivery, DeliveryStream, ExchangeKind, QueueOptions};

/// A failing message is offered this many times before it is dead-lettered.
pub const DEFAULT_MAX_DELIVERIES: u32 = 2;

/// Business logic invoked once per delivered event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &str;

    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError>;
}

/// Queue identity behind a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QueueMode {
    /// Server-named queue owned by this instance. Every instance gets its own
    /// copy of each event.
    #[default]
    Exclusive,
    /// Durable queue shared by every instance of a service type. Each event
    /// is handled by one of them.
    Shared { name: String },
}

/// What to bind and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Topic pattern, e.g. `post.deleted` or `post.*`.
    pub pattern: String,
    pub mode: QueueMode,
}

impl Subscription {
    pub fn exclusive(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            mode: QueueMode::Exclusive,
        }
    }

    pub fn shared(pattern: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            mode: QueueMode::Shared { name: queue.into() },
        }
    }
}

/// What happens to a message that exhausted its deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoisonPolicy {
    /// Republish to `<exchange>.dlx` with reason headers, then ack. The
    /// message is kept in the durable `<exchange>.dlq` queue.
    #[default]
    DeadLetter,
    /// Log a warning and ack.
    Drop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerConfig {
    /// Total deliveries allowed for a failing message, first one included.
    pub max_deliveries: u32,
    pub poison_policy: PoisonPolicy,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            max_deliveries: DEFAULT_MAX_DELIVERIES,
            poison_policy: PoisonPolicy::DeadLetter,
        }
    }
}

/// Acknowledgment applied after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDecision {
    Ack,
    Requeue,
    DeadLetter,
    Drop,
}

impl AckDecision {
    /// Derive the decision from the handler outcome and the delivery count
    /// (1 on first delivery).
    pub fn decide(
        outcome: Result<(), &HandlerError>,
        delivery_count: u32,
        config: &ConsumerConfig,
    ) -> Self {
        match outcome {
            Ok(()) => Self::Ack,
            Err(_) if delivery_count < config.max_deliveries => Self::Requeue,
            Err(_) => match config.poison_policy {
                PoisonPolicy::DeadLetter => Self::DeadLetter,
                PoisonPolicy::Drop => Self::Drop,
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Ack => "ack",
            Self::Requeue => "requeue",
            Self::DeadLetter => "dead_letter",
            Self::Drop => "drop",
        }
    }
}

/// Counters for one subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Successful queue/bind/consume rounds, the first one included.
    pub bindings: u64,
    pub received: u64,
    pub acked: u64,
    pub requeued: u64,
    pub dead_lettered: u64,
    pub dropped: u64,
    /// Decisions that could not be applied; the broker redelivers these.
    pub ack_failures: u64,
}

impl ConsumerStats {
    fn record(&mut self, decision: AckDecision) {
        match decision {
            AckDecision::Ack => self.acked += 1,
            AckDecision::Requeue => self.requeued += 1,
            AckDecision::DeadLetter => self.dead_lettered += 1,
            AckDecision::Drop => self.dropped += 1,
        }
    }
}

/// Creates subscriptions on a shared [`BusClient`].
pub struct EventConsumer {
    client: Arc<BusClient>,
    config: ConsumerConfig,
}

impl EventConsumer {
    #[must_use]
    pub fn new(client: Arc<BusClient>, config: ConsumerConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &Arc<BusClient> {
        &self.client
    }

    /// Declare the queue, bind it, and start dispatching to `handler`.
    ///
    /// The first binding happens before this returns, so events published
    /// afterwards reach the subscription. Later bindings after a channel loss
    /// happen in the background with backoff.
    ///
    /// # Errors
    ///
    /// Any `BusError` from the first binding.
    pub async fn subscribe(
        &self,
        subscription: Subscription,
        handler: Arc<dyn EventHandler>,
    ) -> Result<SubscriptionHandle, BusError> {
        let (stats_tx, stats_rx) = watch::channel(ConsumerStats::default());
        let worker = Worker {
            client: Arc::clone(&self.client),
            config: self.config.clone(),
            subscription,
            handler,
            stats: stats_tx,
        };

        let binding = worker.bind().await?;
        let name = worker.handler.name().to_string();
        let pattern = worker.subscription.pattern.clone();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(worker.run(binding, shutdown_rx));

        Ok(SubscriptionHandle {
            handler: name,
            pattern,
            shutdown: shutdown_tx,
            stats: stats_rx,
            task,
        })
    }
}

/// Owner of a running subscription. Dropping it stops the subscription.
pub struct SubscriptionHandle {
    handler: String,
    pattern: String,
    shutdown: watch::Sender<bool>,
    stats: watch::Receiver<ConsumerStats>,
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    pub fn handler(&self) -> &str {
        &self.handler
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn stats(&self) -> ConsumerStats {
        *self.stats.borrow()
    }

    /// Wait until the counters satisfy `predicate`. Returns the snapshot that
    /// did, or the last one if the subscription stopped first.
    pub async fn wait_until(&self, predicate: impl FnMut(&ConsumerStats) -> bool) -> ConsumerStats {
        let mut stats = self.stats.clone();
        let reached = stats.wait_for(predicate).await.map(|s| *s);
        reached.unwrap_or_else(|_| *stats.borrow())
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop after the in-flight delivery, if any, has been acknowledged.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!(handler = %self.handler, error = %e, "Subscription task panicked");
        }
    }
}

struct Binding {
    channel: Arc<dyn Channel>,
    queue: String,
    consumer_tag: String,
    deliveries: DeliveryStream,
}

struct Worker {
    client: Arc<BusClient>,
    config: ConsumerConfig,
    subscription: Subscription,
    handler: Arc<dyn EventHandler>,
    stats: watch::Sender<ConsumerStats>,
}

impl Worker {
    async fn bind(&self) -> Result<Binding, BusError> {
        let channel = self.client.channel().await?;

        if self.config.poison_policy == PoisonPolicy::DeadLetter {
            let dlx = self.client.dead_letter_exchange();
            let dlq = self.client.dead_letter_queue();
            channel
                .assert_exchange(&dlx, ExchangeKind::Topic, self.client.config().exchange_durable)
                .await?;
            channel
                .declare_queue(&dlq, QueueOptions::shared_durable())
                .await?;
            channel.bind_queue(&dlq, &dlx, "#").await?;
        }

        let queue = match &self.subscription.mode {
            QueueMode::Exclusive => channel.declare_queue("", QueueOptions::exclusive()).await?,
            QueueMode::Shared { name } => {
                channel
                    .declare_queue(name, QueueOptions::shared_durable())
                    .await?
            }
        };
        channel
            .bind_queue(&queue, self.client.exchange(), &self.subscription.pattern)
            .await?;
        let consumer = channel.consume(&queue).await?;

        self.stats.send_modify(|s| s.bindings += 1);
        info!(
            handler = %self.handler.name(),
            queue = %queue,
            pattern = %self.subscription.pattern,
            generation = self.client.generation(),
            "Subscription bound"
        );

        Ok(Binding {
            channel,
            queue,
            consumer_tag: consumer.tag,
            deliveries: consumer.deliveries,
        })
    }

    async fn run(self, mut binding: Binding, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if let Err(e) = binding.channel.cancel(&binding.consumer_tag).await {
                        warn!(handler = %self.handler.name(), error = %e, "Consumer cancel failed");
                    }
                    break;
                }
                next = binding.deliveries.next() => match next {
                    Some(delivery) => self.process(&binding.channel, delivery).await,
                    None => {
                        warn!(
                            handler = %self.handler.name(),
                            queue = %binding.queue,
                            "Delivery stream ended, rebinding"
                        );
                        match self.rebind(&mut shutdown).await {
                            Some(fresh) => binding = fresh,
                            None => break,
                        }
                    }
                },
            }
        }
        info!(handler = %self.handler.name(), "Subscription stopped");
    }

    /// Re-establish channel, queue, binding and consumer. `None` once the
    /// subscription should stop instead.
    async fn rebind(&self, shutdown: &mut watch::Receiver<bool>) -> Option<Binding> {
        let mut attempt = 0;
        loop {
            if *shutdown.borrow() {
                return None;
            }
            match self.bind().await {
                Ok(binding) => return Some(binding),
                Err(BusError::ClientClosed) => {
                    info!(handler = %self.handler.name(), "Bus client closed, not rebinding");
                    return None;
                }
                Err(e) => {
                    let delay: Duration = self.client.config().reconnect.delay(attempt);
                    attempt = attempt.saturating_add(1);
                    warn!(
                        handler = %self.handler.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Rebind failed"
                    );
                    tokio::select! {
                        _ = shutdown.changed() => return None,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    async fn process(&self, channel: &Arc<dyn Channel>, delivery: Delivery) {
        let name = self.handler.name();
        self.stats.send_modify(|s| s.received += 1);

        let started = Instant::now();
        let outcome = match DomainEvent::from_delivery(&delivery) {
            Ok(event) => {
                social_telemetry::log_bus_event!(
                    debug,
                    "Delivery received",
                    event.routing_key,
                    event.message_id,
                    handler = %name,
                    delivery_count = delivery.delivery_count
                );
                self.handler.handle(&event).await
            }
            Err(e) => Err(e),
        };
        social_telemetry::HANDLER_DURATION
            .with_label_values(&[name])
            .observe(started.elapsed().as_secs_f64());

        let decision = AckDecision::decide(
            outcome.as_ref().map(|_| ()),
            delivery.delivery_count,
            &self.config,
        );

        match self.apply(channel, &delivery, decision, outcome.err()).await {
            Ok(applied) => {
                social_telemetry::EVENTS_CONSUMED
                    .with_label_values(&[name, applied.label()])
                    .inc();
                self.stats.send_modify(|s| s.record(applied));
            }
            Err(e) => {
                warn!(
                    handler = %name,
                    delivery_tag = delivery.delivery_tag,
                    decision = decision.label(),
                    error = %e,
                    "Acknowledgment failed, broker will redeliver"
                );
                self.stats.send_modify(|s| s.ack_failures += 1);
            }
        }
    }

    /// Apply a decision. Returns the decision actually applied, which differs
    /// when dead-lettering fails and the message is requeued instead.
    async fn apply(
        &self,
        channel: &Arc<dyn Channel>,
        delivery: &Delivery,
        decision: AckDecision,
        failure: Option<HandlerError>,
    ) -> Result<AckDecision, BusError> {
        let name = self.handler.name();
        let reason = failure
            .as_ref()
            .map_or_else(String::new, ToString::to_string);

        match decision {
            AckDecision::Ack => channel.ack(delivery.delivery_tag).await.map(|()| decision),
            AckDecision::Requeue => {
                warn!(
                    handler = %name,
                    routing_key = %delivery.routing_key,
                    delivery_count = delivery.delivery_count,
                    max_deliveries = self.config.max_deliveries,
                    error = %reason,
                    "Handler failed, requeueing"
                );
                channel
                    .nack(delivery.delivery_tag, true)
                    .await
                    .map(|()| decision)
            }
            AckDecision::Drop => {
                warn!(
                    handler = %name,
                    routing_key = %delivery.routing_key,
                    delivery_count = delivery.delivery_count,
                    error = %reason,
                    "Poison message dropped"
                );
                channel.ack(delivery.delivery_tag).await.map(|()| decision)
            }
            AckDecision::DeadLetter => {
                let kind = failure.as_ref().map_or("failed", HandlerError::kind);
                let mut properties = delivery.properties.clone();
                let headers = &mut properties.headers;
                headers.insert("x-death-reason".to_string(), kind.to_string());
                headers.insert("x-death-error".to_string(), reason.clone());
                headers.insert("x-death-handler".to_string(), name.to_string());
                headers.insert("x-original-exchange".to_string(), delivery.exchange.clone());
                headers.insert(
                    "x-delivery-count".to_string(),
                    delivery.delivery_count.to_string(),
                );

                let dlx = self.client.dead_letter_exchange();
                match channel
                    .publish(&dlx, &delivery.routing_key, properties, delivery.body.clone())
                    .await
                {
                    Ok(()) => {
                        warn!(
                            handler = %name,
                            routing_key = %delivery.routing_key,
                            dead_letter_exchange = %dlx,
                            error = %reason,
                            "Message dead-lettered"
                        );
                        channel.ack(delivery.delivery_tag).await.map(|()| decision)
                    }
                    Err(e) => {
                        error!(
                            handler = %name,
                            routing_key = %delivery.routing_key,
                            error = %e,
                            "Dead-letter publish failed, requeueing"
                        );
                        channel
                            .nack(delivery.delivery_tag, true)
                            .await
                            .map(|()| AckDecision::Requeue)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{BusConfig, ReconnectPolicy};
    use crate::events::routing_keys;
    use crate::memory::InMemoryBroker;
    use crate::publisher::{BusPublisher, EventPublisher};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    /// Records every event; fails the first `failures` calls.
    struct ScriptedHandler {
        failures: AtomicU32,
        calls: AtomicU32,
        seen: Mutex<Vec<DomainEvent>>,
    }

    impl ScriptedHandler {
        fn failing(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EventHandler for ScriptedHandler {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(event.clone());
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(HandlerError::Failed("store unavailable".into()));
            }
            Ok(())
        }
    }

    fn config() -> BusConfig {
        BusConfig {
            url: "amqp://test".to_string(),
            reconnect: ReconnectPolicy {
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                max_attempts: 3,
                ..ReconnectPolicy::default()
            },
            ..BusConfig::default()
        }
    }

    async fn client(broker: &InMemoryBroker) -> Arc<BusClient> {
        BusClient::connect(Arc::new(broker.clone()), config())
            .await
            .unwrap()
    }

    async fn publish(client: &Arc<BusClient>, routing_key: &str) {
        let publisher = BusPublisher::new(Arc::clone(client));
        let event = DomainEvent::new(routing_key, &json!({"postId": "p1"})).unwrap();
        publisher.publish(event).await.unwrap();
    }

    #[test]
    fn test_decide() {
        let config = ConsumerConfig::default();
        let err = HandlerError::Failed("boom".into());

        assert_eq!(AckDecision::decide(Ok(()), 1, &config), AckDecision::Ack);
        assert_eq!(AckDecision::decide(Ok(()), 9, &config), AckDecision::Ack);
        assert_eq!(AckDecision::decide(Err(&err), 1, &config), AckDecision::Requeue);
        assert_eq!(AckDecision::decide(Err(&err), 2, &config), AckDecision::DeadLetter);

        let dropping = ConsumerConfig {
            poison_policy: PoisonPolicy::Drop,
            ..ConsumerConfig::default()
        };
        assert_eq!(AckDecision::decide(Err(&err), 2, &dropping), AckDecision::Drop);

        let single = ConsumerConfig {
            max_deliveries: 1,
            ..ConsumerConfig::default()
        };
        assert_eq!(AckDecision::decide(Err(&err), 1, &single), AckDecision::DeadLetter);
    }

    #[tokio::test]
    async fn test_successful_handler_is_acked() {
        let broker = InMemoryBroker::new();
        let client = client(&broker).await;
        let handler = ScriptedHandler::failing(0);
        let consumer = EventConsumer::new(Arc::clone(&client), ConsumerConfig::default());
        let handle = consumer
            .subscribe(Subscription::exclusive(routing_keys::POST_DELETED), handler.clone())
            .await
            .unwrap();

        publish(&client, routing_keys::POST_DELETED).await;
        publish(&client, routing_keys::POST_CREATED).await;

        let stats = timeout(WAIT, handle.wait_until(|s| s.acked >= 1)).await.unwrap();
        assert_eq!(stats.acked, 1);
        assert_eq!(handler.calls(), 1);
        assert_eq!(handler.seen.lock()[0].routing_key, routing_keys::POST_DELETED);
        assert_eq!(broker.unacked_count(), 0);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_transient_failure_is_requeued_then_acked() {
        let broker = InMemoryBroker::new();
        let client = client(&broker).await;
        let handler = ScriptedHandler::failing(1);
        let consumer = EventConsumer::new(Arc::clone(&client), ConsumerConfig::default());
        let handle = consumer
            .subscribe(Subscription::exclusive("post.*"), handler.clone())
            .await
            .unwrap();

        publish(&client, routing_keys::POST_DELETED).await;

        let stats = timeout(WAIT, handle.wait_until(|s| s.acked >= 1)).await.unwrap();
        assert_eq!(stats.requeued, 1);
        assert_eq!(stats.dead_lettered, 0);
        assert_eq!(handler.calls(), 2);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_persistent_failure_is_dead_lettered() {
        let broker = InMemoryBroker::new();
        let client = client(&broker).await;
        let handler = ScriptedHandler::failing(u32::MAX);
        let consumer = EventConsumer::new(Arc::clone(&client), ConsumerConfig::default());
        let handle = consumer
            .subscribe(Subscription::exclusive(routing_keys::POST_DELETED), handler.clone())
            .await
            .unwrap();

        assert!(broker.queue_names().contains(&client.dead_letter_queue()));

        publish(&client, routing_keys::POST_DELETED).await;

        let stats = timeout(WAIT, handle.wait_until(|s| s.dead_lettered >= 1))
            .await
            .unwrap();
        assert_eq!(stats.requeued, 1);
        assert_eq!(handler.calls(), DEFAULT_MAX_DELIVERIES);
        assert_eq!(broker.unacked_count(), 0);

        let dead = broker.peek(&client.dead_letter_queue());
        assert_eq!(dead.len(), 1);
        assert_eq!(broker.unroutable_count(), 0);
        assert_eq!(dead[0].routing_key, routing_keys::POST_DELETED);
        assert_eq!(dead[0].properties.headers["x-death-reason"], "failed");
        assert_eq!(dead[0].properties.headers["x-delivery-count"], "2");
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_malformed_body_follows_same_policy() {
        let broker = InMemoryBroker::new();
        let client = client(&broker).await;
        let handler = ScriptedHandler::failing(0);
        let consumer = EventConsumer::new(
            Arc::clone(&client),
            ConsumerConfig {
                poison_policy: PoisonPolicy::Drop,
                ..ConsumerConfig::default()
            },
        );
        let handle = consumer
            .subscribe(Subscription::exclusive("#"), handler.clone())
            .await
            .unwrap();

        let channel = client.channel().await.unwrap();
        channel
            .publish(
                "social_events",
                routing_keys::POST_DELETED,
                Default::default(),
                b"{not json".to_vec(),
            )
            .await
            .unwrap();

        let stats = timeout(WAIT, handle.wait_until(|s| s.dropped >= 1)).await.unwrap();
        assert_eq!(stats.requeued, 1);
        assert_eq!(handler.calls(), 0);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_exclusive_subscriptions_fan_out() {
        let broker = InMemoryBroker::new();
        let client = client(&broker).await;
        let first = ScriptedHandler::failing(0);
        let second = ScriptedHandler::failing(0);
        let consumer = EventConsumer::new(Arc::clone(&client), ConsumerConfig::default());
        let a = consumer
            .subscribe(Subscription::exclusive("post.deleted"), first.clone())
            .await
            .unwrap();
        let b = consumer
            .subscribe(Subscription::exclusive("post.deleted"), second.clone())
            .await
            .unwrap();

        publish(&client, routing_keys::POST_DELETED).await;

        timeout(WAIT, a.wait_until(|s| s.acked >= 1)).await.unwrap();
        timeout(WAIT, b.wait_until(|s| s.acked >= 1)).await.unwrap();
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
        a.shutdown().await;
        b.shutdown().await;
    }

    #[tokio::test]
    async fn test_subscription_rebinds_after_restart() {
        let broker = InMemoryBroker::new();
        let client = client(&broker).await;
        let handler = ScriptedHandler::failing(0);
        let consumer = EventConsumer::new(Arc::clone(&client), ConsumerConfig::default());
        let handle = consumer
            .subscribe(Subscription::exclusive("post.deleted"), handler.clone())
            .await
            .unwrap();

        broker.restart();
        timeout(WAIT, handle.wait_until(|s| s.bindings >= 2)).await.unwrap();
        assert_eq!(client.generation(), 2);

        publish(&client, routing_keys::POST_DELETED).await;
        timeout(WAIT, handle.wait_until(|s| s.acked >= 1)).await.unwrap();
        assert_eq!(handler.calls(), 1);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_the_task() {
        let broker = InMemoryBroker::new();
        let client = client(&broker).await;
        let consumer = EventConsumer::new(Arc::clone(&client), ConsumerConfig::default());
        let handle = consumer
            .subscribe(Subscription::shared("post.*", "media-service"), ScriptedHandler::failing(0))
            .await
            .unwrap();
        assert_eq!(broker.consumer_count("media-service"), 1);

        handle.shutdown().await;
        assert_eq!(broker.consumer_count("media-service"), 0);
        assert!(broker.queue_names().contains(&"media-service".to_string()));
    }
}
