//! Normalized search query.

use shared_types::errors::ValidationError;

/// Trimmed, lowercased query text. Matching is case-insensitive, so queries
/// differing only in case share one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchQuery(String);

impl SearchQuery {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(ValidationError::Empty { field: "query" });
        }
        Ok(Self(text.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive substring match.
    pub fn matches(&self, content: &str) -> bool {
        content.to_lowercase().contains(&self.0)
    }
}
