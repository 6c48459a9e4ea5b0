//! # In-Process Topic Broker
//!
//! Adapter for the [`Transport`] port that keeps exchanges, queues, bindings
//! and unacknowledged deliveries in memory, with the AMQP behaviours the
//! consistency layer depends on:
//!
//! - exclusive queues vanish with their channel; durable queues survive
//!   [`InMemoryBroker::restart`]
//! - unacked messages are requeued when their channel closes
//! - every redelivery bumps the delivery count
//! - [`InMemoryBroker::shutdown`] makes `connect` fail until [`InMemoryBroker::start`]
//!
//! Messages in durable queues are treated as persistent.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info};

use crate::error::BusError;
use crate::pattern::RoutingPattern;
use crate::transport::{
    Channel, Consumer, Delivery, ExchangeKind, MessageProperties, QueueOptions, Transport,
};

#[derive(Debug, Clone, Copy)]
struct ExchangeDecl {
    kind: ExchangeKind,
    durable: bool,
}

#[derive(Debug, Clone)]
struct Binding {
    exchange: String,
    queue: String,
    pattern: RoutingPattern,
}

#[derive(Debug, Clone)]
struct StoredMessage {
    exchange: String,
    routing_key: String,
    properties: MessageProperties,
    body: Vec<u8>,
    delivery_count: u32,
}

impl StoredMessage {
    fn to_delivery(&self, delivery_tag: u64) -> Delivery {
        Delivery {
            delivery_tag,
            exchange: self.exchange.clone(),
            routing_key: self.routing_key.clone(),
            properties: self.properties.clone(),
            body: self.body.clone(),
            redelivered: self.delivery_count > 1,
            delivery_count: self.delivery_count,
        }
    }
}

struct ConsumerEntry {
    tag: String,
    channel_id: u64,
    sender: mpsc::UnboundedSender<Delivery>,
}

struct QueueState {
    options: QueueOptions,
    owner: Option<u64>,
    ready: VecDeque<StoredMessage>,
    consumers: Vec<ConsumerEntry>,
    next_consumer: usize,
}

struct Unacked {
    channel_id: u64,
    queue: String,
    message: StoredMessage,
}

#[derive(Default)]
struct BrokerState {
    stopped: bool,
    next_channel_id: u64,
    next_queue_id: u64,
    next_consumer_id: u64,
    next_delivery_tag: u64,
    connections_opened: u64,
    unroutable: u64,
    open_channels: HashSet<u64>,
    exchanges: HashMap<String, ExchangeDecl>,
    queues: HashMap<String, QueueState>,
    bindings: Vec<Binding>,
    unacked: HashMap<u64, Unacked>,
}

impl BrokerState {
    fn ensure_open(&self, channel_id: u64) -> Result<(), BusError> {
        if self.open_channels.contains(&channel_id) {
            Ok(())
        } else {
            Err(BusError::ChannelClosed)
        }
    }

    fn queue_for(&self, channel_id: u64, name: &str) -> Result<&QueueState, BusError> {
        let queue = self
            .queues
            .get(name)
            .ok_or_else(|| BusError::NotFound(format!("queue '{name}'")))?;
        match queue.owner {
            Some(owner) if owner != channel_id => {
                Err(BusError::ResourceLocked(format!("queue '{name}' is exclusive")))
            }
            _ => Ok(queue),
        }
    }

    /// Push ready messages to consumers, round-robin.
    fn dispatch(&mut self, queue_name: &str) {
        loop {
            let Some(queue) = self.queues.get_mut(queue_name) else {
                return;
            };
            if queue.consumers.is_empty() {
                return;
            }
            let Some(mut message) = queue.ready.pop_front() else {
                return;
            };

            let index = queue.next_consumer % queue.consumers.len();
            queue.next_consumer = index + 1;
            message.delivery_count += 1;
            let tag = self.next_delivery_tag + 1;
            let consumer = &queue.consumers[index];

            if consumer.sender.send(message.to_delivery(tag)).is_ok() {
                let channel_id = consumer.channel_id;
                self.next_delivery_tag = tag;
                self.unacked.insert(
                    tag,
                    Unacked {
                        channel_id,
                        queue: queue_name.to_string(),
                        message,
                    },
                );
            } else {
                // Receiver dropped without a cancel.
                queue.consumers.remove(index);
                message.delivery_count -= 1;
                queue.ready.push_front(message);
            }
        }
    }

    fn requeue(&mut self, unacked: Unacked) -> Option<String> {
        let queue = self.queues.get_mut(&unacked.queue)?;
        queue.ready.push_front(unacked.message);
        Some(unacked.queue)
    }

    /// Requeue every unacked message held by `channel_id`, keeping order.
    fn requeue_channel(&mut self, channel_id: u64) -> BTreeSet<String> {
        let mut tags: Vec<u64> = self
            .unacked
            .iter()
            .filter(|(_, u)| u.channel_id == channel_id)
            .map(|(tag, _)| *tag)
            .collect();
        tags.sort_unstable_by(|a, b| b.cmp(a));

        let mut touched = BTreeSet::new();
        for tag in tags {
            if let Some(unacked) = self.unacked.remove(&tag) {
                if let Some(queue) = self.requeue(unacked) {
                    touched.insert(queue);
                }
            }
        }
        touched
    }

    fn delete_queue(&mut self, name: &str) {
        self.queues.remove(name);
        self.bindings.retain(|b| b.queue != name);
    }

    fn close_channel(&mut self, channel_id: u64) {
        if !self.open_channels.remove(&channel_id) {
            return;
        }

        let mut orphaned = Vec::new();
        for (name, queue) in &mut self.queues {
            let before = queue.consumers.len();
            queue.consumers.retain(|c| c.channel_id != channel_id);
            let lost_consumers = before != queue.consumers.len();
            if queue.owner == Some(channel_id)
                || (queue.options.auto_delete && lost_consumers && queue.consumers.is_empty())
            {
                orphaned.push(name.clone());
            }
        }
        for name in &orphaned {
            self.delete_queue(name);
        }

        for queue in self.requeue_channel(channel_id) {
            self.dispatch(&queue);
        }
        debug!(channel_id, deleted_queues = orphaned.len(), "Channel closed");
    }

    /// Drop every channel and everything non-durable.
    fn crash(&mut self) {
        let channels: Vec<u64> = self.open_channels.iter().copied().collect();
        let mut tags: Vec<u64> = self.unacked.keys().copied().collect();
        tags.sort_unstable_by(|a, b| b.cmp(a));
        for tag in tags {
            if let Some(unacked) = self.unacked.remove(&tag) {
                self.requeue(unacked);
            }
        }

        self.open_channels.clear();
        for queue in self.queues.values_mut() {
            queue.consumers.clear();
        }
        self.queues
            .retain(|_, q| q.options.durable && !q.options.exclusive);
        self.exchanges.retain(|_, e| e.durable);

        let queues = &self.queues;
        let exchanges = &self.exchanges;
        self.bindings
            .retain(|b| queues.contains_key(&b.queue) && exchanges.contains_key(&b.exchange));
        debug!(closed_channels = channels.len(), "Broker state reset");
    }
}

/// In-memory topic broker. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Crash and come straight back: channels close, non-durable exchanges
    /// and queues are lost, unacked messages on durable queues are requeued.
    pub fn restart(&self) {
        self.state.lock().crash();
        info!("In-memory broker restarted");
    }

    /// Crash and stay down; `connect` fails until [`Self::start`].
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.crash();
        state.stopped = true;
        info!("In-memory broker stopped");
    }

    pub fn start(&self) {
        self.state.lock().stopped = false;
        info!("In-memory broker started");
    }

    /// Close every open channel without losing broker state, as a network
    /// partition would.
    pub fn drop_connections(&self) {
        let mut state = self.state.lock();
        let channels: Vec<u64> = state.open_channels.iter().copied().collect();
        for channel_id in channels {
            state.close_channel(channel_id);
        }
    }

    // =========================================================================
    // INSPECTION
    // =========================================================================

    /// Number of successful `connect` calls.
    pub fn connections_opened(&self) -> u64 {
        self.state.lock().connections_opened
    }

    pub fn open_channels(&self) -> usize {
        self.state.lock().open_channels.len()
    }

    pub fn has_exchange(&self, name: &str) -> bool {
        self.state.lock().exchanges.contains_key(name)
    }

    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().queues.keys().cloned().collect();
        names.sort();
        names
    }

    /// Ready (not yet delivered) messages in a queue.
    pub fn queue_depth(&self, queue: &str) -> Option<usize> {
        self.state.lock().queues.get(queue).map(|q| q.ready.len())
    }

    pub fn consumer_count(&self, queue: &str) -> usize {
        self.state
            .lock()
            .queues
            .get(queue)
            .map_or(0, |q| q.consumers.len())
    }

    /// Deliveries awaiting ack or nack across all channels.
    pub fn unacked_count(&self) -> usize {
        self.state.lock().unacked.len()
    }

    /// Published messages that matched no binding.
    pub fn unroutable_count(&self) -> u64 {
        self.state.lock().unroutable
    }

    /// Snapshot of the ready messages in a queue, without consuming them.
    pub fn peek(&self, queue: &str) -> Vec<Delivery> {
        self.state
            .lock()
            .queues
            .get(queue)
            .map(|q| q.ready.iter().map(|m| m.to_delivery(0)).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Transport for InMemoryBroker {
    async fn connect(&self, url: &str) -> Result<Arc<dyn Channel>, BusError> {
        let mut state = self.state.lock();
        if state.stopped {
            return Err(BusError::Connection(format!("connection refused: {url}")));
        }
        state.next_channel_id += 1;
        state.connections_opened += 1;
        let id = state.next_channel_id;
        state.open_channels.insert(id);
        debug!(channel_id = id, url, "Channel opened");

        Ok(Arc::new(MemoryChannel {
            id,
            state: Arc::clone(&self.state),
        }))
    }
}

/// Channel handed out by [`InMemoryBroker`].
pub struct MemoryChannel {
    id: u64,
    state: Arc<Mutex<BrokerState>>,
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn assert_exchange(
        &self,
        name: &str,
        kind: ExchangeKind,
        durable: bool,
    ) -> Result<(), BusError> {
        let mut state = self.state.lock();
        state.ensure_open(self.id)?;

        match state.exchanges.get(name) {
            Some(existing) if existing.kind != kind || existing.durable != durable => {
                Err(BusError::PreconditionFailed(format!(
                    "exchange '{name}' exists as {} (durable={}), requested {} (durable={durable})",
                    existing.kind.as_str(),
                    existing.durable,
                    kind.as_str(),
                )))
            }
            Some(_) => Ok(()),
            None => {
                state
                    .exchanges
                    .insert(name.to_string(), ExchangeDecl { kind, durable });
                Ok(())
            }
        }
    }

    async fn declare_queue(&self, name: &str, options: QueueOptions) -> Result<String, BusError> {
        let mut state = self.state.lock();
        state.ensure_open(self.id)?;

        if !name.is_empty() {
            if let Some(existing) = state.queues.get(name) {
                if matches!(existing.owner, Some(owner) if owner != self.id) {
                    return Err(BusError::ResourceLocked(format!(
                        "queue '{name}' is exclusive"
                    )));
                }
                if existing.options.durable != options.durable {
                    return Err(BusError::PreconditionFailed(format!(
                        "queue '{name}' exists with durable={}",
                        existing.options.durable
                    )));
                }
                return Ok(name.to_string());
            }
        }

        let name = if name.is_empty() {
            state.next_queue_id += 1;
            format!("amq.gen-{}", state.next_queue_id)
        } else {
            name.to_string()
        };
        let owner = options.exclusive.then_some(self.id);
        state.queues.insert(
            name.clone(),
            QueueState {
                options,
                owner,
                ready: VecDeque::new(),
                consumers: Vec::new(),
                next_consumer: 0,
            },
        );
        Ok(name)
    }

    async fn bind_queue(&self, queue: &str, exchange: &str, pattern: &str) -> Result<(), BusError> {
        let mut state = self.state.lock();
        state.ensure_open(self.id)?;
        state.queue_for(self.id, queue)?;
        if !state.exchanges.contains_key(exchange) {
            return Err(BusError::NotFound(format!("exchange '{exchange}'")));
        }

        let exists = state
            .bindings
            .iter()
            .any(|b| b.queue == queue && b.exchange == exchange && b.pattern.as_str() == pattern);
        if !exists {
            state.bindings.push(Binding {
                exchange: exchange.to_string(),
                queue: queue.to_string(),
                pattern: RoutingPattern::new(pattern),
            });
        }
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        properties: MessageProperties,
        body: Vec<u8>,
    ) -> Result<(), BusError> {
        let mut state = self.state.lock();
        state.ensure_open(self.id)?;
        if !state.exchanges.contains_key(exchange) {
            return Err(BusError::NotFound(format!("exchange '{exchange}'")));
        }

        let targets: BTreeSet<String> = state
            .bindings
            .iter()
            .filter(|b| b.exchange == exchange && b.pattern.matches(routing_key))
            .map(|b| b.queue.clone())
            .collect();

        if targets.is_empty() {
            state.unroutable += 1;
            debug!(exchange, routing_key, "Message unroutable, dropped");
            return Ok(());
        }

        for queue in &targets {
            if let Some(q) = state.queues.get_mut(queue) {
                q.ready.push_back(StoredMessage {
                    exchange: exchange.to_string(),
                    routing_key: routing_key.to_string(),
                    properties: properties.clone(),
                    body: body.clone(),
                    delivery_count: 0,
                });
            }
        }
        for queue in &targets {
            state.dispatch(queue);
        }
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<Consumer, BusError> {
        let mut state = self.state.lock();
        state.ensure_open(self.id)?;
        state.queue_for(self.id, queue)?;

        state.next_consumer_id += 1;
        let tag = format!("ctag-{}", state.next_consumer_id);
        let (sender, receiver) = mpsc::unbounded_channel();
        if let Some(q) = state.queues.get_mut(queue) {
            q.consumers.push(ConsumerEntry {
                tag: tag.clone(),
                channel_id: self.id,
                sender,
            });
        }
        state.dispatch(queue);

        Ok(Consumer {
            tag,
            deliveries: Box::pin(UnboundedReceiverStream::new(receiver)),
        })
    }

    async fn cancel(&self, consumer_tag: &str) -> Result<(), BusError> {
        let mut state = self.state.lock();
        state.ensure_open(self.id)?;

        let mut emptied = None;
        for (name, queue) in &mut state.queues {
            let before = queue.consumers.len();
            queue
                .consumers
                .retain(|c| !(c.tag == consumer_tag && c.channel_id == self.id));
            if before != queue.consumers.len() {
                if queue.options.auto_delete && queue.consumers.is_empty() {
                    emptied = Some(name.clone());
                }
                break;
            }
        }
        if let Some(name) = emptied {
            state.delete_queue(&name);
        }
        Ok(())
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), BusError> {
        let mut state = self.state.lock();
        state.ensure_open(self.id)?;
        let owned = matches!(state.unacked.get(&delivery_tag), Some(u) if u.channel_id == self.id);
        if !owned {
            return Err(BusError::UnknownDeliveryTag(delivery_tag));
        }
        state.unacked.remove(&delivery_tag);
        Ok(())
    }

    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), BusError> {
        let mut state = self.state.lock();
        state.ensure_open(self.id)?;
        let owned = matches!(state.unacked.get(&delivery_tag), Some(u) if u.channel_id == self.id);
        if !owned {
            return Err(BusError::UnknownDeliveryTag(delivery_tag));
        }

        if let Some(unacked) = state.unacked.remove(&delivery_tag) {
            if requeue {
                if let Some(queue) = state.requeue(unacked) {
                    state.dispatch(&queue);
                }
            }
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().open_channels.contains(&self.id)
    }

    async fn close(&self) {
        self.state.lock().close_channel(self.id);
    }
}
