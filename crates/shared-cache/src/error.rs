//! Cache store errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The store could not be reached.
    #[error("cache connection error: {0}")]
    Connection(String),

    /// A value could not be encoded to JSON before storing.
    #[error("cache serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
