//! # Domain Events
//!
//! Events that flow through the topic exchange. The wire body of a message is
//! the payload JSON itself; the message id and publish time travel in the
//! message properties.

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::entities::{MediaId, PostId, UserId};
use uuid::Uuid;

use crate::error::{BusError, HandlerError};
use crate::transport::{Delivery, MessageProperties};

/// Routing keys published by the post service.
pub mod routing_keys {
    /// A post was created.
    pub const POST_CREATED: &str = "post.created";
    /// A post was deleted; consumers clean up what it referenced.
    pub const POST_DELETED: &str = "post.deleted";
}

/// A published state change.
///
/// Immutable once published; consumers get a shared reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    /// Correlates publish and consume logs and dead-letter entries.
    pub message_id: Uuid,
    /// Dot-separated event type, e.g. `post.deleted`.
    pub routing_key: String,
    pub payload: Value,
    pub published_at: DateTime<Utc>,
}

impl DomainEvent {
    /// Build an event from any serializable payload.
    ///
    /// # Errors
    ///
    /// - `BusError::Serialization` - the payload does not serialize to JSON
    pub fn new<T: Serialize>(routing_key: impl Into<String>, payload: &T) -> Result<Self, BusError> {
        Ok(Self {
            message_id: Uuid::new_v4(),
            routing_key: routing_key.into(),
            payload: serde_json::to_value(payload)?,
            published_at: Utc::now(),
        })
    }

    /// Decode the payload into a typed struct.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        T::deserialize(&self.payload).map_err(HandlerError::from)
    }

    /// UTF-8 JSON body sent to the broker.
    pub fn body(&self) -> Result<Vec<u8>, BusError> {
        serde_json::to_vec(&self.payload).map_err(BusError::from)
    }

    /// Message properties carrying the id and publish time.
    #[must_use]
    pub fn properties(&self) -> MessageProperties {
        MessageProperties {
            message_id: Some(self.message_id.to_string()),
            content_type: Some("application/json".to_string()),
            timestamp: Some(self.published_at.timestamp_millis()),
            headers: Default::default(),
        }
    }

    /// Rebuild an event from a broker delivery.
    ///
    /// Missing properties are tolerated (a fresh id, the current time); a body
    /// that is not JSON is not.
    pub fn from_delivery(delivery: &Delivery) -> Result<Self, HandlerError> {
        let payload: Value = serde_json::from_slice(&delivery.body)?;
        let message_id = delivery
            .properties
            .message_id
            .as_deref()
            .and_then(|id| Uuid::parse_str(id).ok())
            .unwrap_or_else(Uuid::new_v4);
        let published_at = delivery
            .properties
            .timestamp
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now);

        Ok(Self {
            message_id,
            routing_key: delivery.routing_key.clone(),
            payload,
            published_at,
        })
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Payload of `post.deleted`.
///
/// `media_ids` is captured at deletion time; the post row no longer exists
/// when consumers see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDeletedPayload {
    pub post_id: PostId,
    pub user_id: UserId,
    pub media_ids: Vec<MediaId>,
}

/// Payload of `post.created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostCreatedPayload {
    pub post_id: PostId,
    pub user_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
