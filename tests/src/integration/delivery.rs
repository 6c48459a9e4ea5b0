//! # Delivery Semantics
//!
//! Fan-out across exclusive queues, work-queue sharing on a durable queue,
//! and requeue-then-dead-letter for failing handlers.

#[cfg(test)]
mod tests {
    use serde_json::json;
    use shared_bus::{
        routing_keys, ConsumerConfig, EventConsumer, InMemoryBroker, PoisonPolicy,
        Subscription, DEFAULT_MAX_DELIVERIES,
    };
    use std::time::Duration;

    use crate::fixtures::{bus_client, publish, wait_for, ScriptedHandler};

    async fn consumer(broker: &InMemoryBroker, config: ConsumerConfig) -> EventConsumer {
        EventConsumer::new(bus_client(broker).await, config)
    }

    #[tokio::test]
    async fn test_every_exclusive_subscriber_gets_a_copy() {
        let broker = InMemoryBroker::new();
        let media = ScriptedHandler::ok("media");
        let search = ScriptedHandler::ok("search");
        let media_sub = consumer(&broker, ConsumerConfig::default())
            .await
            .subscribe(Subscription::exclusive("post.deleted"), media.clone())
            .await
            .unwrap();
        let search_sub = consumer(&broker, ConsumerConfig::default())
            .await
            .subscribe(Subscription::exclusive("post.*"), search.clone())
            .await
            .unwrap();

        let publisher = shared_bus::BusPublisher::new(bus_client(&broker).await);
        publish(&publisher, routing_keys::POST_DELETED, &json!({"postId": "p1"})).await;

        wait_for(&media_sub, |s| s.acked >= 1).await;
        wait_for(&search_sub, |s| s.acked >= 1).await;
        assert_eq!(media.calls(), 1);
        assert_eq!(search.calls(), 1);

        media_sub.shutdown().await;
        search_sub.shutdown().await;
    }

    #[tokio::test]
    async fn test_shared_queue_delivers_once_per_service() {
        let broker = InMemoryBroker::new();
        let first = ScriptedHandler::ok("media-1");
        let second = ScriptedHandler::ok("media-2");
        let shared = || Subscription::shared(routing_keys::POST_DELETED, "media-service.post.deleted");
        let a = consumer(&broker, ConsumerConfig::default())
            .await
            .subscribe(shared(), first.clone())
            .await
            .unwrap();
        let b = consumer(&broker, ConsumerConfig::default())
            .await
            .subscribe(shared(), second.clone())
            .await
            .unwrap();
        assert_eq!(broker.consumer_count("media-service.post.deleted"), 2);

        let publisher = shared_bus::BusPublisher::new(bus_client(&broker).await);
        for n in 0..4 {
            publish(&publisher, routing_keys::POST_DELETED, &json!({"postId": n})).await;
        }

        tokio::time::timeout(Duration::from_secs(5), async {
            while first.calls() + second.calls() < 4 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(first.calls() + second.calls(), 4);
        assert!(first.calls() > 0 && second.calls() > 0);
        a.shutdown().await;
        b.shutdown().await;
    }

    #[tokio::test]
    async fn test_failing_handler_runs_max_deliveries_then_dead_letters() {
        let broker = InMemoryBroker::new();
        let handler = ScriptedHandler::always_failing("broken");
        let sub = consumer(&broker, ConsumerConfig::default())
            .await
            .subscribe(Subscription::exclusive("post.deleted"), handler.clone())
            .await
            .unwrap();

        let publisher = shared_bus::BusPublisher::new(bus_client(&broker).await);
        publish(&publisher, routing_keys::POST_DELETED, &json!({"postId": "p1"})).await;

        let stats = wait_for(&sub, |s| s.dead_lettered >= 1).await;
        assert_eq!(handler.calls(), DEFAULT_MAX_DELIVERIES);
        assert_eq!(stats.requeued, u64::from(DEFAULT_MAX_DELIVERIES - 1));
        assert_eq!(broker.unacked_count(), 0);

        let dead = broker.peek("social_events.dlq");
        assert_eq!(dead.len(), 1);
        assert_eq!(broker.unroutable_count(), 0);
        assert_eq!(dead[0].properties.headers["x-death-handler"], "broken");
        assert_eq!(dead[0].properties.headers["x-original-exchange"], "social_events");
        assert_eq!(dead[0].body, handler.seen()[0].body().unwrap());
        sub.shutdown().await;
    }

    #[tokio::test]
    async fn test_drop_policy_acks_without_dead_letter() {
        let broker = InMemoryBroker::new();
        let handler = ScriptedHandler::always_failing("broken");
        let config = ConsumerConfig {
            max_deliveries: 3,
            poison_policy: PoisonPolicy::Drop,
        };
        let sub = consumer(&broker, config)
            .await
            .subscribe(Subscription::exclusive("#"), handler.clone())
            .await
            .unwrap();

        let publisher = shared_bus::BusPublisher::new(bus_client(&broker).await);
        publish(&publisher, routing_keys::POST_CREATED, &json!({"postId": "p1"})).await;

        let stats = wait_for(&sub, |s| s.dropped >= 1).await;
        assert_eq!(handler.calls(), 3);
        assert_eq!(stats.dead_lettered, 0);
        assert!(!broker.has_exchange("social_events.dlx"));
        assert!(!broker.queue_names().contains(&"social_events.dlq".to_string()));
        assert_eq!(broker.unacked_count(), 0);
        sub.shutdown().await;
    }
}
