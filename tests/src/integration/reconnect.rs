//! # Reconnect Resilience
//!
//! Broker restarts, outages and dropped connections. Subscriptions rebind on
//! their own; publishers reconnect on the next call.

#[cfg(test)]
mod tests {
    use platform_runtime::container::QueueModeSetting;
    use shared_bus::{routing_keys, BusError, PostDeletedPayload};
    use shared_types::entities::{MediaId, PostId, UserId};
    use sp_03_post_service::{NewPost, PostApi, PostError};
    use sp_04_media_service::PostDeletedCleanup;
    use sp_05_search_service::{PostCreatedIndexer, PostDeletedIndexer};

    use crate::fixtures::{fast_config, publish, wait_for, Platform};

    const HANDLERS: [&str; 3] = [
        PostDeletedCleanup::NAME,
        PostCreatedIndexer::NAME,
        PostDeletedIndexer::NAME,
    ];

    async fn wait_rebound(platform: &Platform) {
        for handler in HANDLERS {
            wait_for(platform.subscription(handler), |s| s.bindings >= 2).await;
        }
    }

    #[tokio::test]
    async fn test_events_flow_again_after_broker_restart() {
        let platform = Platform::start().await;
        let container = platform.runtime.container();

        platform.broker.restart();
        wait_rebound(&platform).await;

        let post = container
            .post
            .create_post(NewPost::new(UserId::new("u1"), "after restart", vec![]))
            .await
            .unwrap();
        wait_for(platform.subscription(PostCreatedIndexer::NAME), |s| s.acked >= 1).await;

        assert!(container.search_index.contains(&post.id));
        assert_eq!(container.post_bus.generation(), 2);
        platform.shutdown().await;
    }

    #[tokio::test]
    async fn test_publish_fails_during_outage_and_recovers() {
        let platform = Platform::start().await;
        let container = platform.runtime.container();

        platform.broker.shutdown();
        let lost = container
            .post
            .create_post(NewPost::new(UserId::new("u1"), "during outage", vec![]))
            .await;
        assert!(matches!(
            lost,
            Err(PostError::Publish(BusError::Connection(_)))
        ));
        // The write committed; only its event is missing.
        assert_eq!(container.post_repository.len(), 1);

        platform.broker.start();
        wait_rebound(&platform).await;

        let post = container
            .post
            .create_post(NewPost::new(UserId::new("u1"), "after outage", vec![]))
            .await
            .unwrap();
        let stats = wait_for(platform.subscription(PostCreatedIndexer::NAME), |s| {
            s.acked >= 1
        })
        .await;

        assert_eq!(stats.received, 1);
        assert_eq!(container.search_index.len(), 1);
        assert!(container.search_index.contains(&post.id));
        platform.shutdown().await;
    }

    #[tokio::test]
    async fn test_shared_queue_keeps_events_across_dropped_connections() {
        let mut config = fast_config();
        config.bus.queue_mode = QueueModeSetting::Shared;
        let platform = Platform::start_with(config).await;
        let container = platform.runtime.container();
        let publisher = platform.external_publisher().await;

        platform.broker.drop_connections();
        publish(
            &publisher,
            routing_keys::POST_DELETED,
            &PostDeletedPayload {
                post_id: PostId::new("p1"),
                user_id: UserId::new("u1"),
                media_ids: vec![MediaId::new("m1")],
            },
        )
        .await;

        let stats = wait_for(platform.subscription(PostDeletedCleanup::NAME), |s| {
            s.acked >= 1
        })
        .await;
        assert_eq!(stats.bindings, 2);
        assert!(platform
            .broker
            .queue_names()
            .contains(&"media-service.post.deleted".to_string()));
        assert!(container.media_repository.is_empty());
        platform.shutdown().await;
    }
}
