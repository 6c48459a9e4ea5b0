//! # Outbound Ports
//!
//! - [`MediaRepository`]: record store
//! - [`ObjectStorage`]: blob storage addressed by a public id

use async_trait::async_trait;
use shared_types::entities::{MediaId, MediaRecord};

use crate::domain::{RepositoryError, StorageError};

/// Where an uploaded blob ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub public_id: String,
    pub url: String,
}

/// Result of a delete-if-exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

impl DeleteOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Deleted => "deleted",
            Self::NotFound => "already_gone",
        }
    }
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        original_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredObject, StorageError>;

    /// Remove the blob if present. A missing blob is `Ok(NotFound)`.
    async fn delete_object(&self, public_id: &str) -> Result<DeleteOutcome, StorageError>;
}

#[async_trait]
pub trait MediaRepository: Send + Sync {
    async fn insert(&self, record: MediaRecord) -> Result<(), RepositoryError>;

    async fn find(&self, id: &MediaId) -> Result<Option<MediaRecord>, RepositoryError>;

    async fn list(&self) -> Result<Vec<MediaRecord>, RepositoryError>;

    /// Remove a record; `false` if it did not exist.
    async fn delete(&self, id: &MediaId) -> Result<bool, RepositoryError>;
}
