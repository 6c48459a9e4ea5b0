//! # Broker Transport Port
//!
//! The operations the bus client needs from a topic broker, shaped after an
//! AMQP 0-9-1 channel. `memory::InMemoryBroker` is the in-process adapter.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;

use crate::error::BusError;

/// Exchange routing behaviour. The bus only routes by topic pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    /// Pattern match on dot-separated words.
    Topic,
}

impl ExchangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Topic => "topic",
        }
    }
}

/// Queue declaration flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOptions {
    /// Survives a broker restart.
    pub durable: bool,
    /// Owned by the declaring channel; deleted when it closes.
    pub exclusive: bool,
    /// Deleted when its last consumer is cancelled.
    pub auto_delete: bool,
}

impl QueueOptions {
    /// Per-instance queue: server-named, exclusive, auto-deleted.
    #[must_use]
    pub fn exclusive() -> Self {
        Self {
            durable: false,
            exclusive: true,
            auto_delete: true,
        }
    }

    /// Per-service-type work queue shared across instances.
    #[must_use]
    pub fn shared_durable() -> Self {
        Self {
            durable: true,
            exclusive: false,
            auto_delete: false,
        }
    }
}

/// Message metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageProperties {
    pub message_id: Option<String>,
    pub content_type: Option<String>,
    /// Publish time in Unix milliseconds.
    pub timestamp: Option<i64>,
    pub headers: BTreeMap<String, String>,
}

/// A message handed to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Channel-scoped tag used for ack/nack.
    pub delivery_tag: u64,
    pub exchange: String,
    pub routing_key: String,
    pub properties: MessageProperties,
    pub body: Vec<u8>,
    /// Set once the message has been delivered before.
    pub redelivered: bool,
    /// 1 on first delivery, incremented on every redelivery.
    pub delivery_count: u32,
}

/// Stream of deliveries for one consumer. Ends when the channel closes or
/// the consumer is cancelled.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Delivery> + Send>>;

/// A registered consumer.
pub struct Consumer {
    pub tag: String,
    pub deliveries: DeliveryStream,
}

/// An open channel on a broker connection.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Declare an exchange. Idempotent when kind and durability match.
    ///
    /// # Errors
    ///
    /// - `BusError::PreconditionFailed` - exists with a different kind or durability
    async fn assert_exchange(
        &self,
        name: &str,
        kind: ExchangeKind,
        durable: bool,
    ) -> Result<(), BusError>;

    /// Declare a queue and return its name. An empty name asks the broker to
    /// generate one.
    async fn declare_queue(&self, name: &str, options: QueueOptions) -> Result<String, BusError>;

    async fn bind_queue(&self, queue: &str, exchange: &str, pattern: &str) -> Result<(), BusError>;

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        properties: MessageProperties,
        body: Vec<u8>,
    ) -> Result<(), BusError>;

    async fn consume(&self, queue: &str) -> Result<Consumer, BusError>;

    async fn cancel(&self, consumer_tag: &str) -> Result<(), BusError>;

    async fn ack(&self, delivery_tag: u64) -> Result<(), BusError>;

    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), BusError>;

    fn is_open(&self) -> bool;

    async fn close(&self);
}

/// Opens channels to a broker.
#[async_trait]
pub trait Transport: Send + Sync {
    /// # Errors
    ///
    /// - `BusError::Connection` - broker unreachable or credentials rejected
    async fn connect(&self, url: &str) -> Result<Arc<dyn Channel>, BusError>;
}
