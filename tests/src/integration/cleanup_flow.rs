//! # Cross-Service Cleanup
//!
//! `post.deleted` published by the post service removes the post's media
//! in the media service and its document in the search index.

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use shared_bus::{routing_keys, PostDeletedPayload};
    use shared_types::entities::{MediaId, MediaRecord, PostId, UserId};
    use sp_03_post_service::{NewPost, PostApi};
    use sp_04_media_service::{MediaApi, MediaRepository, PostDeletedCleanup, UploadRequest};
    use sp_05_search_service::{PostCreatedIndexer, PostDeletedIndexer};

    use crate::fixtures::{publish, wait_for, Platform};

    // =========================================================================
    // FIXTURES
    // =========================================================================

    async fn seed_media(platform: &Platform, id: &str) {
        let container = platform.runtime.container();
        let public_id = format!("blob-{id}");
        container.media_storage.insert(public_id.clone(), vec![0xFF]);
        container
            .media_repository
            .insert(MediaRecord {
                id: MediaId::new(id),
                public_id,
                original_name: format!("{id}.jpg"),
                mime_type: "image/jpeg".to_string(),
                url: format!("memory://blob-{id}"),
                user_id: UserId::new("u1"),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    fn p1_deleted() -> PostDeletedPayload {
        PostDeletedPayload {
            post_id: PostId::new("p1"),
            user_id: UserId::new("u1"),
            media_ids: vec![MediaId::new("m1"), MediaId::new("m2")],
        }
    }

    // =========================================================================
    // SCENARIOS
    // =========================================================================

    /// Deleting p1 with media m1, m2 removes both; redelivery deletes nothing.
    #[tokio::test]
    async fn test_post_deleted_cleans_up_media_once() {
        let platform = Platform::start().await;
        seed_media(&platform, "m1").await;
        seed_media(&platform, "m2").await;
        seed_media(&platform, "m3").await;
        let container = platform.runtime.container();
        let cleanup = platform.subscription(PostDeletedCleanup::NAME);
        let publisher = platform.external_publisher().await;

        publish(&publisher, routing_keys::POST_DELETED, &p1_deleted()).await;
        wait_for(cleanup, |s| s.acked >= 1).await;

        assert!(!container.media_repository.contains(&MediaId::new("m1")));
        assert!(!container.media_repository.contains(&MediaId::new("m2")));
        assert!(container.media_repository.contains(&MediaId::new("m3")));
        assert_eq!(container.media_storage.deletions(), 2);

        publish(&publisher, routing_keys::POST_DELETED, &p1_deleted()).await;
        let stats = wait_for(cleanup, |s| s.acked >= 2).await;

        assert_eq!(container.media_storage.deletions(), 2);
        assert_eq!(stats.requeued, 0);
        assert_eq!(container.media_repository.len(), 1);
        platform.shutdown().await;
    }

    #[tokio::test]
    async fn test_delete_through_post_service_reaches_media_and_search() {
        let platform = Platform::start().await;
        let container = platform.runtime.container();

        let mut media_ids = Vec::new();
        for name in ["a.png", "b.png"] {
            let record = container
                .media
                .register_upload(UploadRequest {
                    user_id: UserId::new("u1"),
                    original_name: name.to_string(),
                    mime_type: "image/png".to_string(),
                    bytes: b"png".to_vec(),
                })
                .await
                .unwrap();
            media_ids.push(record.id);
        }

        let post = container
            .post
            .create_post(NewPost::new(UserId::new("u1"), "with pictures", media_ids))
            .await
            .unwrap();
        wait_for(platform.subscription(PostCreatedIndexer::NAME), |s| s.acked >= 1).await;
        assert!(container.search_index.contains(&post.id));

        container
            .post
            .delete_post(&post.id, &UserId::new("u1"))
            .await
            .unwrap();
        wait_for(platform.subscription(PostDeletedCleanup::NAME), |s| s.acked >= 1).await;
        wait_for(platform.subscription(PostDeletedIndexer::NAME), |s| s.acked >= 1).await;

        assert!(container.media_repository.is_empty());
        assert!(container.media_storage.is_empty());
        assert!(!container.search_index.contains(&post.id));
        platform.shutdown().await;
    }

    #[tokio::test]
    async fn test_transient_storage_failure_is_retried() {
        let platform = Platform::start().await;
        seed_media(&platform, "m1").await;
        seed_media(&platform, "m2").await;
        let container = platform.runtime.container();
        container.media_storage.fail_next_deletes(1);

        let publisher = platform.external_publisher().await;
        publish(&publisher, routing_keys::POST_DELETED, &p1_deleted()).await;

        let stats = wait_for(platform.subscription(PostDeletedCleanup::NAME), |s| {
            s.acked >= 1
        })
        .await;
        assert_eq!(stats.requeued, 1);
        assert!(container.media_repository.is_empty());
        assert_eq!(container.media_storage.deletions(), 2);
        platform.shutdown().await;
    }

    #[tokio::test]
    async fn test_persistent_storage_failure_is_dead_lettered() {
        let platform = Platform::start().await;
        seed_media(&platform, "m1").await;
        let container = platform.runtime.container();
        container.media_storage.set_available(false);

        let unroutable_before = platform.broker.unroutable_count();
        let publisher = platform.external_publisher().await;
        publish(&publisher, routing_keys::POST_DELETED, &p1_deleted()).await;

        let stats = wait_for(platform.subscription(PostDeletedCleanup::NAME), |s| {
            s.dead_lettered >= 1
        })
        .await;
        assert_eq!(stats.received, 2);
        assert!(container.media_repository.contains(&MediaId::new("m1")));

        let dead = platform.broker.peek("social_events.dlq");
        assert_eq!(dead.len(), 1);
        assert_eq!(platform.broker.unroutable_count(), unroutable_before);
        assert_eq!(
            dead[0].properties.headers["x-death-handler"],
            PostDeletedCleanup::NAME
        );
        platform.shutdown().await;
    }
}
