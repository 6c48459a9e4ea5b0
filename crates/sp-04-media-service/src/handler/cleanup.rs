//! # Post Deleted Cleanup
//!
//! Removes media that belonged to a deleted post. Runs on `post.deleted`.

use async_trait::async_trait;
use shared_bus::{DomainEvent, EventHandler, HandlerError, PostDeletedPayload};
use shared_types::entities::MediaId;
use std::sync::Arc;
use tracing::{debug, info};

use crate::ports::{DeleteOutcome, MediaRepository, ObjectStorage};

pub struct PostDeletedCleanup {
    repository: Arc<dyn MediaRepository>,
    storage: Arc<dyn ObjectStorage>,
}

impl PostDeletedCleanup {
    pub const NAME: &'static str = "media.post_deleted_cleanup";

    pub fn new(repository: Arc<dyn MediaRepository>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            repository,
            storage,
        }
    }

    /// Blob first, then record. A failure in between leaves the record for
    /// the next delivery to find.
    async fn remove(&self, id: &MediaId) -> Result<DeleteOutcome, HandlerError> {
        let Some(record) = self
            .repository
            .find(id)
            .await
            .map_err(|e| HandlerError::Failed(e.to_string()))?
        else {
            debug!(media_id = %id, "Media record already gone");
            return Ok(DeleteOutcome::NotFound);
        };

        let blob = self
            .storage
            .delete_object(&record.public_id)
            .await
            .map_err(|e| HandlerError::Failed(e.to_string()))?;
        if blob == DeleteOutcome::NotFound {
            debug!(media_id = %id, public_id = %record.public_id, "Blob already gone");
        }

        let removed = self
            .repository
            .delete(id)
            .await
            .map_err(|e| HandlerError::Failed(e.to_string()))?;
        if !removed {
            debug!(media_id = %id, "Media record removed concurrently");
            return Ok(DeleteOutcome::NotFound);
        }
        Ok(DeleteOutcome::Deleted)
    }
}

#[async_trait]
impl EventHandler for PostDeletedCleanup {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        let payload: PostDeletedPayload = event.decode()?;

        let mut deleted = 0usize;
        for id in &payload.media_ids {
            let outcome = self.remove(id).await?;
            social_telemetry::MEDIA_CLEANUP
                .with_label_values(&[outcome.label()])
                .inc();
            if outcome == DeleteOutcome::Deleted {
                deleted += 1;
            }
        }

        info!(
            post_id = %payload.post_id,
            requested = payload.media_ids.len(),
            deleted,
            "Processed media cleanup for deleted post"
        );
        Ok(())
    }
}
