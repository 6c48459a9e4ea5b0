//! # Shared Bus - Event Bus for Cross-Service Consistency
//!
//! State changes in one service reach the services that depend on them
//! through a topic exchange.
//!
//! ```text
//! ┌──────────────┐                         ┌──────────────┐
//! │ Post service │                         │ Media service│
//! │              │  publish(post.deleted)  │              │
//! │              │ ──────┐                 │  cleanup     │
//! └──────────────┘       │                 └──────────────┘
//!                        ▼                        ↑
//!                  ┌──────────────┐               │
//!                  │ social_events│ ──────────────┘
//!                  │ (topic)      │  queue bound to post.deleted
//!                  └──────────────┘
//! ```
//!
//! ## Pieces
//!
//! - [`BusClient`]: one owned channel per process, lazy reconnect with
//!   bounded backoff
//! - [`BusPublisher`]: at-least-once emission; failures go to the caller
//! - [`EventConsumer`]: durable subscriptions, ack / requeue / dead-letter
//! - [`InMemoryBroker`]: in-process adapter for the [`Transport`] port
//! - `AmqpTransport` (feature `amqp`): RabbitMQ adapter over `lapin`
//!
//! ## Delivery
//!
//! A failing message is redelivered until it has been offered
//! `max_deliveries` times, then moved to `<exchange>.dlx` and kept in the
//! durable `<exchange>.dlq` queue.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

#[cfg(feature = "amqp")]
pub mod amqp;
pub mod client;
pub mod consumer;
pub mod error;
pub mod events;
pub mod memory;
pub mod pattern;
pub mod publisher;
pub mod transport;

// Re-export main types
pub use client::{
    BusClient, BusConfig, ReconnectPolicy, DEAD_LETTER_QUEUE_SUFFIX, DEAD_LETTER_SUFFIX,
    DEFAULT_EXCHANGE,
};
pub use consumer::{
    AckDecision, ConsumerConfig, ConsumerStats, EventConsumer, EventHandler, PoisonPolicy,
    QueueMode, Subscription, SubscriptionHandle, DEFAULT_MAX_DELIVERIES,
};
pub use error::{BusError, HandlerError};
pub use events::{routing_keys, DomainEvent, PostCreatedPayload, PostDeletedPayload};
pub use memory::InMemoryBroker;

#[cfg(feature = "amqp")]
pub use amqp::AmqpTransport;
pub use pattern::RoutingPattern;
pub use publisher::{BusPublisher, EventPublisher, RecordingPublisher};
pub use transport::{
    Channel, Consumer, Delivery, DeliveryStream, ExchangeKind, MessageProperties, QueueOptions,
    Transport,
};
