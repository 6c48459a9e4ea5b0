//! Search subsystem error types.

use shared_cache::CacheError;
use shared_types::errors::ValidationError;
use thiserror::Error;

/// Search index failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("search index unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}
