//! # Event Publisher
//!
//! Defines the publishing side of the event bus.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, warn};

use crate::client::BusClient;
use crate::error::BusError;
use crate::events::DomainEvent;

/// Trait for publishing events to the bus.
///
/// Delivery is at-least-once from the publisher's side: a returned `Ok`
/// means the broker accepted the message. There is no local retry queue; a
/// failure goes back to the caller.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event to the topic exchange under its routing key.
    async fn publish(&self, event: DomainEvent) -> Result<(), BusError>;

    /// Get the total number of events accepted by the broker.
    fn events_published(&self) -> u64;
}

/// Publisher backed by the shared [`BusClient`] channel.
pub struct BusPublisher {
    client: Arc<BusClient>,
    events_published: AtomicU64,
}

impl BusPublisher {
    #[must_use]
    pub fn new(client: Arc<BusClient>) -> Self {
        Self {
            client,
            events_published: AtomicU64::new(0),
        }
    }

    fn record_failure(&self, event: &DomainEvent, e: &BusError) {
        social_telemetry::PUBLISH_FAILURES
            .with_label_values(&[event.routing_key.as_str()])
            .inc();
        error!(
            routing_key = %event.routing_key,
            message_id = %event.message_id,
            error = %e,
            "Event publish failed"
        );
    }
}

#[async_trait]
impl EventPublisher for BusPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<(), BusError> {
        let body = event.body()?;
        let properties = event.properties();
        let mut retried = false;

        loop {
            let channel = match self.client.channel().await {
                Ok(channel) => channel,
                Err(e) => {
                    self.record_failure(&event, &e);
                    return Err(e);
                }
            };

            match channel
                .publish(
                    self.client.exchange(),
                    &event.routing_key,
                    properties.clone(),
                    body.clone(),
                )
                .await
            {
                Ok(()) => {
                    self.events_published.fetch_add(1, Ordering::Relaxed);
                    social_telemetry::EVENTS_PUBLISHED
                        .with_label_values(&[event.routing_key.as_str()])
                        .inc();
                    social_telemetry::log_bus_event!(
                        debug,
                        "Event published",
                        event.routing_key,
                        event.message_id,
                        bytes = body.len()
                    );
                    return Ok(());
                }
                // The channel died between the open check and the send; one
                // fresh channel is worth a second try.
                Err(BusError::ChannelClosed) if !retried => {
                    retried = true;
                    warn!(
                        routing_key = %event.routing_key,
                        message_id = %event.message_id,
                        "Channel closed during publish, retrying once"
                    );
                }
                Err(e) => {
                    self.record_failure(&event, &e);
                    return Err(e);
                }
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

/// Publisher that keeps events in memory, for tests of the producing side.
///
/// `fail_with` makes every publish return the given error until cleared.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<DomainEvent>>,
    failure: Mutex<Option<BusError>>,
}

impl RecordingPublisher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, error: Option<BusError>) {
        *self.failure.lock() = error;
    }

    /// Events accepted so far.
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().clone()
    }

    /// Events accepted so far with the given routing key.
    pub fn events_for(&self, routing_key: &str) -> Vec<DomainEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.routing_key == routing_key)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<(), BusError> {
        if let Some(e) = self.failure.lock().clone() {
            return Err(e);
        }
        self.events.lock().push(event);
        Ok(())
    }

    fn events_published(&self) -> u64 {
        self.events.lock().len() as u64
    }
}
