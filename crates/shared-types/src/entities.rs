//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Identity**: `UserId`
//! - **Content**: `PostId`, `PostRecord`
//! - **Media**: `MediaId`, `MediaRecord`
//! - **Search**: `SearchDocument`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().simple().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identifier of a user account (owned by the identity service).
    UserId
);
string_id!(
    /// Identifier of a post.
    PostId
);
string_id!(
    /// Identifier of an uploaded media item.
    MediaId
);

// =============================================================================
// CONTENT
// =============================================================================

/// A post as stored by the post service and served from its cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    pub id: PostId,
    pub user_id: UserId,
    pub content: String,
    /// Media attached to the post. Captured into `post.deleted` so the media
    /// service can clean up after the post row is gone.
    pub media_ids: Vec<MediaId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// MEDIA
// =============================================================================

/// An uploaded media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    pub id: MediaId,
    /// Object-storage locator of the backing blob.
    pub public_id: String,
    pub original_name: String,
    pub mime_type: String,
    pub url: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// SEARCH
// =============================================================================

/// Denormalized copy of a post held by the search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchDocument {
    pub post_id: PostId,
    pub user_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
