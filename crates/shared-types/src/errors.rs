//! # Error Types
//!
//! Errors shared by every service that accepts caller input.

use thiserror::Error;

/// Caller-facing validation failures. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Page numbers start at 1.
    #[error("page must be >= 1, got {0}")]
    InvalidPage(u32),

    /// Page size outside the accepted range.
    #[error("limit must be between 1 and {max}, got {actual}")]
    InvalidLimit { actual: u32, max: u32 },

    /// A required text field was empty.
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
}
