//! Post creation input.

use chrono::{DateTime, Utc};
use shared_types::entities::{MediaId, PostId, PostRecord, UserId};
use shared_types::errors::ValidationError;

/// A post as submitted by its author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub user_id: UserId,
    pub content: String,
    pub media_ids: Vec<MediaId>,
}

impl NewPost {
    pub fn new(user_id: UserId, content: impl Into<String>, media_ids: Vec<MediaId>) -> Self {
        Self {
            user_id,
            content: content.into(),
            media_ids,
        }
    }

    /// Content must contain something other than whitespace.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.content.trim().is_empty() {
            return Err(ValidationError::Empty { field: "content" });
        }
        Ok(())
    }

    /// Assign an id and timestamps.
    pub fn into_record(self, id: PostId, now: DateTime<Utc>) -> PostRecord {
        PostRecord {
            id,
            user_id: self.user_id,
            content: self.content,
            media_ids: self.media_ids,
            created_at: now,
            updated_at: now,
        }
    }
}
