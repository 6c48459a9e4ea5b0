//! # Post Service
//!
//! Implements [`PostApi`] over a [`PostRepository`], the shared cache and the
//! event bus.
//!
//! ## Write ordering
//!
//! repository write → invalidate → publish. Invalidation failures are logged
//! and do not fail the call. A publish failure is returned after the write
//! has committed.

use async_trait::async_trait;
use chrono::Utc;
use shared_bus::{routing_keys, DomainEvent, EventPublisher, PostCreatedPayload, PostDeletedPayload};
use shared_cache::keys::{self, CacheTtls};
use shared_cache::{
    CacheStore, CachedJson, InvalidationCoordinator, InvalidationScope, ReadThroughCache,
};
use shared_types::entities::{PostId, PostRecord, UserId};
use shared_types::pagination::PageRequest;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{NewPost, PostError};
use crate::ports::{PostApi, PostRepository};

pub struct PostService {
    repository: Arc<dyn PostRepository>,
    cache: ReadThroughCache,
    invalidator: InvalidationCoordinator,
    publisher: Arc<dyn EventPublisher>,
    ttls: CacheTtls,
}

impl PostService {
    pub fn new(
        repository: Arc<dyn PostRepository>,
        store: Arc<dyn CacheStore>,
        publisher: Arc<dyn EventPublisher>,
        ttls: CacheTtls,
    ) -> Self {
        Self {
            repository,
            cache: ReadThroughCache::new(Arc::clone(&store)),
            invalidator: InvalidationCoordinator::new(store),
            publisher,
            ttls,
        }
    }

    /// Item key plus every list key.
    fn scope_for(id: &PostId) -> InvalidationScope {
        InvalidationScope::new()
            .key(keys::post(id))
            .pattern(keys::POST_LISTS_PATTERN)
    }

    async fn invalidate(&self, id: &PostId) {
        let report = self.invalidator.invalidate(&Self::scope_for(id)).await;
        if !report.is_complete() {
            warn!(
                post_id = %id,
                failures = report.failures.len(),
                "Post keys may be stale until their TTL expires"
            );
        }
    }
}

#[async_trait]
impl PostApi for PostService {
    async fn create_post(&self, post: NewPost) -> Result<PostRecord, PostError> {
        post.validate()?;
        let record = post.into_record(PostId::generate(), Utc::now());
        self.repository.insert(record.clone()).await?;
        info!(post_id = %record.id, user_id = %record.user_id, "Post created");

        self.invalidate(&record.id).await;

        let event = DomainEvent::new(
            routing_keys::POST_CREATED,
            &PostCreatedPayload {
                post_id: record.id.clone(),
                user_id: record.user_id.clone(),
                content: record.content.clone(),
                created_at: record.created_at,
            },
        )?;
        self.publisher.publish(event).await?;
        Ok(record)
    }

    async fn get_post(&self, id: &PostId) -> Result<CachedJson, PostError> {
        let repository = &self.repository;
        self.cache
            .get_or_load(&keys::post(id), self.ttls.post, move || async move {
                repository
                    .find(id)
                    .await?
                    .ok_or_else(|| PostError::NotFound(id.clone()))
            })
            .await
    }

    async fn list_posts(&self, page: PageRequest) -> Result<CachedJson, PostError> {
        let repository = &self.repository;
        self.cache
            .get_or_load(&keys::post_list(&page), self.ttls.post_list, move || async move {
                Ok::<_, PostError>(repository.list(&page).await?)
            })
            .await
    }

    async fn delete_post(&self, id: &PostId, user: &UserId) -> Result<PostRecord, PostError> {
        let post = self
            .repository
            .find(id)
            .await?
            .ok_or_else(|| PostError::NotFound(id.clone()))?;

        if &post.user_id != user {
            return Err(PostError::NotOwner {
                post_id: id.clone(),
                user_id: user.clone(),
            });
        }

        if !self.repository.delete(id).await? {
            return Err(PostError::NotFound(id.clone()));
        }
        info!(post_id = %id, user_id = %user, media = post.media_ids.len(), "Post deleted");

        self.invalidate(id).await;

        let event = DomainEvent::new(
            routing_keys::POST_DELETED,
            &PostDeletedPayload {
                post_id: post.id.clone(),
                user_id: post.user_id.clone(),
                media_ids: post.media_ids.clone(),
            },
        )?;
        self.publisher.publish(event).await?;
        Ok(post)
    }
}
