//! # Cache Consistency
//!
//! TTL bound on staleness, and complete invalidation of item and list keys
//! after a mutation.

#[cfg(test)]
mod tests {
    use serde_json::json;
    use shared_bus::{routing_keys, PostCreatedPayload};
    use shared_cache::keys;
    use shared_cache::{CacheSource, CacheStore, ReadThroughCache};
    use shared_types::entities::{PostId, PostRecord, SearchDocument, UserId};
    use shared_types::pagination::{Page, PageRequest};
    use sp_03_post_service::{NewPost, PostApi, PostError};
    use sp_05_search_service::{PostCreatedIndexer, SearchApi};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use crate::fixtures::{publish, wait_for, Platform, ScriptedHandler};

    #[derive(Debug)]
    struct LoadError;

    impl From<shared_cache::CacheError> for LoadError {
        fn from(_: shared_cache::CacheError) -> Self {
            LoadError
        }
    }

    /// TTL 5s: an immediate read hits, a read at 6s reloads.
    #[tokio::test]
    async fn test_entry_is_reloaded_after_ttl() {
        let platform = Platform::start().await;
        let cache = ReadThroughCache::new(platform.cache.clone());
        let loads = AtomicU32::new(0);
        let counter = &loads;
        let load = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, LoadError>(json!({"id": "p1"}))
        };
        let ttl = Duration::from_secs(5);

        let first = cache.get_or_load("post:p1", ttl, load).await.unwrap();
        let second = cache.get_or_load("post:p1", ttl, load).await.unwrap();
        assert_eq!(first.source, CacheSource::Miss);
        assert!(second.is_hit());
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        platform.clock.advance(Duration::from_secs(6));
        let third = cache.get_or_load("post:p1", ttl, load).await.unwrap();
        assert_eq!(third.source, CacheSource::Miss);
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        platform.shutdown().await;
    }

    /// A post mutation clears `posts:1:10`; the next read recomputes it.
    #[tokio::test]
    async fn test_mutation_clears_list_page() {
        let platform = Platform::start().await;
        let posts = &platform.runtime.container().post;
        let page = PageRequest::new(1, 10).unwrap();

        posts
            .create_post(NewPost::new(UserId::new("u1"), "first", vec![]))
            .await
            .unwrap();
        posts.list_posts(page).await.unwrap();
        assert!(posts.list_posts(page).await.unwrap().is_hit());

        tokio::time::sleep(Duration::from_millis(2)).await;
        posts
            .create_post(NewPost::new(UserId::new("u1"), "second", vec![]))
            .await
            .unwrap();
        assert_eq!(platform.cache.get("posts:1:10").await.unwrap(), None);

        let fresh = posts.list_posts(page).await.unwrap();
        assert_eq!(fresh.source, CacheSource::Miss);
        let listed: Page<PostRecord> = fresh.parse().unwrap();
        assert_eq!(listed.items.len(), 2);
        assert_eq!(listed.items[0].content, "second");
        assert_eq!(
            platform.cache.get("posts:1:10").await.unwrap(),
            Some(fresh.body)
        );
        platform.shutdown().await;
    }

    #[tokio::test]
    async fn test_delete_clears_item_and_every_list_key() {
        let platform = Platform::start().await;
        let posts = &platform.runtime.container().post;
        let post = posts
            .create_post(NewPost::new(UserId::new("u1"), "doomed", vec![]))
            .await
            .unwrap();
        posts.get_post(&post.id).await.unwrap();
        for (n, limit) in [(1, 10), (2, 10), (1, 50)] {
            posts
                .list_posts(PageRequest::new(n, limit).unwrap())
                .await
                .unwrap();
        }
        assert_eq!(platform.cache.keys("post*").await.unwrap().len(), 4);

        posts
            .delete_post(&post.id, &UserId::new("u1"))
            .await
            .unwrap();

        assert!(platform.cache.keys("post*").await.unwrap().is_empty());
        assert_eq!(
            posts.get_post(&post.id).await.unwrap_err(),
            PostError::NotFound(post.id.clone())
        );
        platform.shutdown().await;
    }

    /// Failed deletes publish nothing and invalidate nothing.
    #[tokio::test]
    async fn test_failed_delete_has_no_side_effects() {
        let platform = Platform::start().await;
        let container = platform.runtime.container();
        let observer = ScriptedHandler::ok("observer");
        let consumer = shared_bus::EventConsumer::new(
            crate::fixtures::bus_client(&platform.broker).await,
            shared_bus::ConsumerConfig::default(),
        );
        let observer_handle = consumer
            .subscribe(
                shared_bus::Subscription::exclusive(routing_keys::POST_DELETED),
                observer.clone(),
            )
            .await
            .unwrap();

        let kept = container
            .post
            .create_post(NewPost::new(UserId::new("u1"), "kept", vec![]))
            .await
            .unwrap();
        let other = container
            .post
            .create_post(NewPost::new(UserId::new("u2"), "other", vec![]))
            .await
            .unwrap();
        container.post.get_post(&kept.id).await.unwrap();
        container
            .post
            .list_posts(PageRequest::default())
            .await
            .unwrap();
        let cached = platform.cache.keys("*").await.unwrap();

        let not_owner = container
            .post
            .delete_post(&kept.id, &UserId::new("u2"))
            .await;
        assert!(matches!(not_owner, Err(PostError::NotOwner { .. })));
        let missing = container
            .post
            .delete_post(&PostId::new("ghost"), &UserId::new("u1"))
            .await;
        assert!(matches!(missing, Err(PostError::NotFound(_))));
        container.post_repository.set_available(false);
        let outage = container
            .post
            .delete_post(&kept.id, &UserId::new("u1"))
            .await;
        assert!(matches!(outage, Err(PostError::Store(_))));
        container.post_repository.set_available(true);

        assert_eq!(platform.cache.keys("*").await.unwrap(), cached);

        // Publish order holds per channel; nothing was sent before this.
        container
            .post
            .delete_post(&other.id, &UserId::new("u2"))
            .await
            .unwrap();
        wait_for(&observer_handle, |s| s.acked >= 1).await;
        assert_eq!(observer.calls(), 1);
        assert_eq!(
            observer.seen()[0]
                .decode::<shared_bus::PostDeletedPayload>()
                .unwrap()
                .post_id,
            other.id
        );

        observer_handle.shutdown().await;
        platform.shutdown().await;
    }

    #[tokio::test]
    async fn test_search_results_follow_index_updates() {
        let platform = Platform::start().await;
        let container = platform.runtime.container();
        let indexed = platform.subscription(PostCreatedIndexer::NAME);

        let before = container.search.search("rust").await.unwrap();
        assert!(before.parse::<Vec<SearchDocument>>().unwrap().is_empty());
        assert!(container.search.search("rust").await.unwrap().is_hit());

        let publisher = platform.external_publisher().await;
        publish(
            &publisher,
            routing_keys::POST_CREATED,
            &PostCreatedPayload {
                post_id: PostId::new("p1"),
                user_id: UserId::new("u1"),
                content: "Learning Rust".to_string(),
                created_at: chrono::Utc::now(),
            },
        )
        .await;
        wait_for(indexed, |s| s.acked >= 1).await;

        let after = container.search.search("rust").await.unwrap();
        assert_eq!(after.source, CacheSource::Miss);
        let docs: Vec<SearchDocument> = after.parse().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(platform.cache.ttl(&keys::search("rust")), Some(keys::SEARCH_TTL));
        platform.shutdown().await;
    }

    #[tokio::test]
    async fn test_cache_outage_falls_through_to_store() {
        let platform = Platform::start().await;
        let posts = &platform.runtime.container().post;
        platform.cache.set_available(false);

        let post = posts
            .create_post(NewPost::new(UserId::new("u1"), "still works", vec![]))
            .await
            .unwrap();
        let read = posts.get_post(&post.id).await.unwrap();
        assert_eq!(read.source, CacheSource::Miss);
        assert_eq!(read.parse::<PostRecord>().unwrap().id, post.id);
        platform.shutdown().await;
    }
}
