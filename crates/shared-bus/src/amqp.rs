//! # AMQP Transport
//!
//! Adapter for the [`Transport`] port over a RabbitMQ broker, built on
//! `lapin`. Each [`Transport::connect`] opens one connection with one
//! channel in publisher-confirm mode and a prefetch of one, so a consumer
//! holds at most one unacknowledged delivery at a time.
//!
//! Durable shared queues are declared as quorum queues, which report how
//! often a message was delivered in the `x-delivery-count` header. Classic
//! queues only report the `redelivered` flag; there a redelivery counts as
//! the second delivery.

use async_trait::async_trait;
use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicNackOptions,
    BasicPublishOptions, BasicQosOptions, ConfirmSelectOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions,
};
use lapin::protocol::{AMQPErrorKind, AMQPSoftError};
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::{BasicProperties, Connection, ConnectionProperties};
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::error::BusError;
use crate::transport::{
    Channel, Consumer, Delivery, ExchangeKind, MessageProperties, QueueOptions, Transport,
};

/// Header set by quorum queues: deliveries before this one.
const DELIVERY_COUNT_HEADER: &str = "x-delivery-count";

/// Persistent delivery mode.
const PERSISTENT: u8 = 2;

/// Broker transport over AMQP 0-9-1.
#[derive(Clone)]
pub struct AmqpTransport {
    properties: ConnectionProperties,
    prefetch: u16,
}

impl AmqpTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            properties: ConnectionProperties::default(),
            prefetch: 1,
        }
    }

    /// Unacknowledged deliveries the broker may push per consumer.
    #[must_use]
    pub fn with_prefetch(mut self, prefetch: u16) -> Self {
        self.prefetch = prefetch.max(1);
        self
    }
}

impl Default for AmqpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for AmqpTransport {
    async fn connect(&self, url: &str) -> Result<Arc<dyn Channel>, BusError> {
        let connection = Connection::connect(url, self.properties.clone())
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;
        let channel = connection.create_channel().await.map_err(map_error)?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(map_error)?;
        channel
            .basic_qos(self.prefetch, BasicQosOptions::default())
            .await
            .map_err(map_error)?;

        debug!(url, "AMQP channel opened");
        Ok(Arc::new(AmqpChannel {
            connection,
            channel,
        }))
    }
}

/// One connection and its single channel.
pub struct AmqpChannel {
    connection: Connection,
    channel: lapin::Channel,
}

#[async_trait]
impl Channel for AmqpChannel {
    async fn assert_exchange(
        &self,
        name: &str,
        kind: ExchangeKind,
        durable: bool,
    ) -> Result<(), BusError> {
        let kind = match kind {
            ExchangeKind::Topic => lapin::ExchangeKind::Topic,
        };
        self.channel
            .exchange_declare(
                name,
                kind,
                ExchangeDeclareOptions {
                    durable,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(map_error)
    }

    async fn declare_queue(&self, name: &str, options: QueueOptions) -> Result<String, BusError> {
        let queue = self
            .channel
            .queue_declare(
                name,
                QueueDeclareOptions {
                    durable: options.durable,
                    exclusive: options.exclusive,
                    auto_delete: options.auto_delete,
                    ..QueueDeclareOptions::default()
                },
                queue_arguments(options),
            )
            .await
            .map_err(map_error)?;
        Ok(queue.name().as_str().to_string())
    }

    async fn bind_queue(&self, queue: &str, exchange: &str, pattern: &str) -> Result<(), BusError> {
        self.channel
            .queue_bind(
                queue,
                exchange,
                pattern,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(map_error)
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        properties: MessageProperties,
        body: Vec<u8>,
    ) -> Result<(), BusError> {
        let confirmation = self
            .channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                &body,
                to_basic_properties(&properties),
            )
            .await
            .map_err(map_error)?
            .await
            .map_err(map_error)?;

        if confirmation.is_nack() {
            return Err(BusError::Connection(format!(
                "broker rejected message for {exchange}/{routing_key}"
            )));
        }
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<Consumer, BusError> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                "",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(map_error)?;
        let tag = consumer.tag().as_str().to_string();

        let deliveries = consumer
            .take_while(|item| match item {
                Ok(_) => true,
                Err(e) => {
                    warn!(error = %e, "AMQP consumer stream failed");
                    false
                }
            })
            .filter_map(Result::ok)
            .map(from_lapin_delivery);

        Ok(Consumer {
            tag,
            deliveries: Box::pin(deliveries),
        })
    }

    async fn cancel(&self, consumer_tag: &str) -> Result<(), BusError> {
        self.channel
            .basic_cancel(consumer_tag, BasicCancelOptions::default())
            .await
            .map_err(map_error)
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), BusError> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(map_error)
    }

    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), BusError> {
        self.channel
            .basic_nack(
                delivery_tag,
                BasicNackOptions {
                    requeue,
                    ..BasicNackOptions::default()
                },
            )
            .await
            .map_err(map_error)
    }

    fn is_open(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }

    async fn close(&self) {
        if let Err(e) = self.connection.close(200, "closing").await {
            debug!(error = %e, "AMQP connection already closed");
        }
    }
}

fn map_error(e: lapin::Error) -> BusError {
    match &e {
        lapin::Error::ProtocolError(amqp) => match amqp.kind() {
            AMQPErrorKind::Soft(AMQPSoftError::PRECONDITIONFAILED) => {
                BusError::PreconditionFailed(e.to_string())
            }
            AMQPErrorKind::Soft(AMQPSoftError::RESOURCELOCKED) => {
                BusError::ResourceLocked(e.to_string())
            }
            AMQPErrorKind::Soft(AMQPSoftError::NOTFOUND) => BusError::NotFound(e.to_string()),
            _ => BusError::Connection(e.to_string()),
        },
        lapin::Error::InvalidChannelState(_) => BusError::ChannelClosed,
        _ => BusError::Connection(e.to_string()),
    }
}

/// Quorum type for shared durable queues.
fn queue_arguments(options: QueueOptions) -> FieldTable {
    let mut arguments = FieldTable::default();
    if options.durable && !options.exclusive {
        arguments.insert(
            ShortString::from("x-queue-type"),
            AMQPValue::LongString(LongString::from("quorum")),
        );
    }
    arguments
}

fn to_basic_properties(properties: &MessageProperties) -> BasicProperties {
    let mut headers = FieldTable::default();
    for (key, value) in &properties.headers {
        headers.insert(
            ShortString::from(key.clone()),
            AMQPValue::LongString(LongString::from(value.clone())),
        );
    }

    let mut basic = BasicProperties::default()
        .with_delivery_mode(PERSISTENT)
        .with_headers(headers);
    if let Some(id) = &properties.message_id {
        basic = basic.with_message_id(ShortString::from(id.clone()));
    }
    if let Some(content_type) = &properties.content_type {
        basic = basic.with_content_type(ShortString::from(content_type.clone()));
    }
    // AMQP timestamps carry whole seconds.
    if let Some(seconds) = properties
        .timestamp
        .and_then(|ms| u64::try_from(ms / 1000).ok())
    {
        basic = basic.with_timestamp(seconds);
    }
    basic
}

fn from_basic_properties(basic: &BasicProperties) -> MessageProperties {
    let headers = basic
        .headers()
        .as_ref()
        .map(|table| {
            table
                .inner()
                .iter()
                .filter_map(|(key, value)| {
                    header_text(value).map(|text| (key.as_str().to_string(), text))
                })
                .collect()
        })
        .unwrap_or_default();

    MessageProperties {
        message_id: basic.message_id().as_ref().map(|s| s.as_str().to_string()),
        content_type: basic.content_type().as_ref().map(|s| s.as_str().to_string()),
        timestamp: basic
            .timestamp()
            .as_ref()
            .and_then(|seconds| i64::try_from(*seconds).ok())
            .map(|seconds| seconds.saturating_mul(1000)),
        headers,
    }
}

fn header_text(value: &AMQPValue) -> Option<String> {
    match value {
        AMQPValue::LongString(s) => Some(String::from_utf8_lossy(s.as_bytes()).into_owned()),
        AMQPValue::ShortString(s) => Some(s.as_str().to_string()),
        other => header_number(other).map(|n| n.to_string()),
    }
}

fn header_number(value: &AMQPValue) -> Option<u64> {
    match value {
        AMQPValue::ShortShortUInt(n) => Some(u64::from(*n)),
        AMQPValue::ShortUInt(n) => Some(u64::from(*n)),
        AMQPValue::LongUInt(n) => Some(u64::from(*n)),
        AMQPValue::ShortShortInt(n) => u64::try_from(*n).ok(),
        AMQPValue::ShortInt(n) => u64::try_from(*n).ok(),
        AMQPValue::LongInt(n) => u64::try_from(*n).ok(),
        AMQPValue::LongLongInt(n) => u64::try_from(*n).ok(),
        _ => None,
    }
}

/// 1 on first delivery. Prefers the quorum-queue counter over the flag.
fn delivery_count(basic: &BasicProperties, redelivered: bool) -> u32 {
    let previous = basic
        .headers()
        .as_ref()
        .and_then(|table| table.inner().get(DELIVERY_COUNT_HEADER))
        .and_then(header_number);

    match previous {
        Some(previous) => u32::try_from(previous.saturating_add(1)).unwrap_or(u32::MAX),
        None if redelivered => 2,
        None => 1,
    }
}

fn from_lapin_delivery(delivery: lapin::message::Delivery) -> Delivery {
    // The acker stays behind; acks go through the channel by tag.
    Delivery {
        delivery_tag: delivery.delivery_tag,
        exchange: delivery.exchange.as_str().to_string(),
        routing_key: delivery.routing_key.as_str().to_string(),
        delivery_count: delivery_count(&delivery.properties, delivery.redelivered),
        properties: from_basic_properties(&delivery.properties),
        redelivered: delivery.redelivered,
        body: delivery.data.clone(),
    }
}
