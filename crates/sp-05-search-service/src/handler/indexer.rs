//! # Index Maintenance
//!
//! Applies post lifecycle events to the [`SearchIndex`] and clears every
//! cached search result afterwards.

use async_trait::async_trait;
use shared_bus::{DomainEvent, EventHandler, HandlerError, PostCreatedPayload, PostDeletedPayload};
use shared_cache::keys::SEARCH_RESULTS_PATTERN;
use shared_cache::{CacheStore, InvalidationCoordinator, InvalidationScope};
use shared_types::entities::SearchDocument;
use std::sync::Arc;
use tracing::{debug, info};

use crate::ports::SearchIndex;

fn results_scope() -> InvalidationScope {
    InvalidationScope::new().pattern(SEARCH_RESULTS_PATTERN)
}

/// Upserts a document on `post.created`.
pub struct PostCreatedIndexer {
    index: Arc<dyn SearchIndex>,
    invalidator: InvalidationCoordinator,
}

impl PostCreatedIndexer {
    pub const NAME: &'static str = "search.post_created_indexer";

    pub fn new(index: Arc<dyn SearchIndex>, store: Arc<dyn CacheStore>) -> Self {
        Self {
            index,
            invalidator: InvalidationCoordinator::new(store),
        }
    }
}

#[async_trait]
impl EventHandler for PostCreatedIndexer {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        let payload: PostCreatedPayload = event.decode()?;
        let post_id = payload.post_id.clone();

        self.index
            .upsert(SearchDocument {
                post_id: payload.post_id,
                user_id: payload.user_id,
                content: payload.content,
                created_at: payload.created_at,
            })
            .await
            .map_err(|e| HandlerError::Failed(e.to_string()))?;

        self.invalidator.invalidate(&results_scope()).await;
        info!(post_id = %post_id, "Post indexed");
        Ok(())
    }
}

/// Removes the document on `post.deleted`.
pub struct PostDeletedIndexer {
    index: Arc<dyn SearchIndex>,
    invalidator: InvalidationCoordinator,
}

impl PostDeletedIndexer {
    pub const NAME: &'static str = "search.post_deleted_indexer";

    pub fn new(index: Arc<dyn SearchIndex>, store: Arc<dyn CacheStore>) -> Self {
        Self {
            index,
            invalidator: InvalidationCoordinator::new(store),
        }
    }
}

#[async_trait]
impl EventHandler for PostDeletedIndexer {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        let payload: PostDeletedPayload = event.decode()?;

        let removed = self
            .index
            .remove(&payload.post_id)
            .await
            .map_err(|e| HandlerError::Failed(e.to_string()))?;
        if !removed {
            debug!(post_id = %payload.post_id, "Post was not indexed");
        }

        self.invalidator.invalidate(&results_scope()).await;
        info!(post_id = %payload.post_id, "Post removed from index");
        Ok(())
    }
}
