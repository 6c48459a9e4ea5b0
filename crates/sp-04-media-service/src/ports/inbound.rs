//! # Inbound Port - MediaApi

use async_trait::async_trait;
use shared_types::entities::MediaRecord;

use crate::domain::{MediaError, UploadRequest};

#[async_trait]
pub trait MediaApi: Send + Sync {
    /// Store the blob, then the record.
    ///
    /// # Errors
    /// - `Validation`: empty file, name or mime type
    /// - `Storage`: the blob was not stored; no record exists
    /// - `Store`: the record write failed; the blob is removed again
    async fn register_upload(&self, upload: UploadRequest) -> Result<MediaRecord, MediaError>;

    /// All media records, newest first.
    async fn list_media(&self) -> Result<Vec<MediaRecord>, MediaError>;
}
