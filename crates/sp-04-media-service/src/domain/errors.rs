//! Media subsystem error types.

use shared_types::errors::ValidationError;
use thiserror::Error;

/// Object storage failure other than "not found".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("object storage unavailable: {0}")]
    Unavailable(String),
}

/// Media record store failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("media store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Store(#[from] RepositoryError),
}
