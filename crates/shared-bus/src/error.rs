//! # Bus Errors
//!
//! `BusError` covers the broker connection and channel operations.
//! `HandlerError` is what an event handler returns; the consumer turns it
//! into an acknowledgment decision.

use thiserror::Error;

/// Errors from the bus client, publisher and transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The broker could not be reached, or reconnect attempts ran out.
    #[error("connection error: {0}")]
    Connection(String),

    /// The channel was closed underneath the caller.
    #[error("channel closed")]
    ChannelClosed,

    /// A declaration conflicts with an existing one (kind or durability).
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// An exclusive queue is owned by another channel.
    #[error("resource locked: {0}")]
    ResourceLocked(String),

    /// Exchange or queue does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A delivery tag that this channel does not hold.
    #[error("unknown delivery tag {0}")]
    UnknownDeliveryTag(u64),

    /// The event payload could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// `close()` was called on the client.
    #[error("bus client closed")]
    ClientClosed,
}

impl BusError {
    /// Whether a fresh channel could make the same call succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::ChannelClosed)
    }
}

impl From<serde_json::Error> for BusError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Outcome of a failed event handler.
///
/// Both variants go through the same bounded redelivery policy; they are
/// separated so logs and dead-letter headers can tell them apart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// The payload did not decode into the expected shape.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// A downstream store or storage call failed.
    #[error("handler failed: {0}")]
    Failed(String),
}

impl HandlerError {
    /// Short label used in metrics and dead-letter headers.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::Failed(_) => "failed",
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}
