//! Post subsystem error types.

use shared_bus::BusError;
use shared_cache::CacheError;
use shared_types::entities::{PostId, UserId};
use shared_types::errors::ValidationError;
use thiserror::Error;

/// Failure of the source-of-truth store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("post store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("post {0} not found")]
    NotFound(PostId),

    /// Only the author may delete a post.
    #[error("user {user_id} does not own post {post_id}")]
    NotOwner { post_id: PostId, user_id: UserId },

    #[error(transparent)]
    Store(#[from] RepositoryError),

    /// The mutation committed but its event was not accepted by the broker.
    #[error("event publish failed: {0}")]
    Publish(#[from] BusError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl PostError {
    /// Errors caused by the caller rather than by infrastructure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound(_) | Self::NotOwner { .. }
        )
    }
}
