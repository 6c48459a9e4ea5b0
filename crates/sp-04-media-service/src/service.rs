//! # Media Service
//!
//! Upload registration and listing over [`MediaRepository`] and
//! [`ObjectStorage`].

use async_trait::async_trait;
use chrono::Utc;
use shared_types::entities::{MediaId, MediaRecord};
use std::sync::Arc;
use tracing::{error, info};

use crate::domain::{MediaError, UploadRequest};
use crate::ports::{MediaApi, MediaRepository, ObjectStorage};

pub struct MediaService {
    repository: Arc<dyn MediaRepository>,
    storage: Arc<dyn ObjectStorage>,
}

impl MediaService {
    pub fn new(repository: Arc<dyn MediaRepository>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            repository,
            storage,
        }
    }
}

#[async_trait]
impl MediaApi for MediaService {
    async fn register_upload(&self, upload: UploadRequest) -> Result<MediaRecord, MediaError> {
        upload.validate()?;
        let UploadRequest {
            user_id,
            original_name,
            mime_type,
            bytes,
        } = upload;

        let stored = self
            .storage
            .upload(&original_name, &mime_type, bytes)
            .await?;

        let record = MediaRecord {
            id: MediaId::generate(),
            public_id: stored.public_id,
            original_name,
            mime_type,
            url: stored.url,
            user_id,
            created_at: Utc::now(),
        };

        if let Err(e) = self.repository.insert(record.clone()).await {
            // No record will ever point at this blob.
            if let Err(cleanup) = self.storage.delete_object(&record.public_id).await {
                error!(
                    public_id = %record.public_id,
                    error = %cleanup,
                    "Failed to remove blob after record write failed"
                );
            }
            return Err(e.into());
        }

        info!(media_id = %record.id, user_id = %record.user_id, "Media uploaded");
        Ok(record)
    }

    async fn list_media(&self) -> Result<Vec<MediaRecord>, MediaError> {
        Ok(self.repository.list().await?)
    }
}
