//! Subscription setup.

use shared_bus::{routing_keys, BusError, EventConsumer, EventHandler, SubscriptionHandle};
use sp_04_media_service::PostDeletedCleanup;
use sp_05_search_service::{PostCreatedIndexer, PostDeletedIndexer};
use std::sync::Arc;
use tracing::info;

use crate::container::{BusSettings, PlatformContainer};

pub const MEDIA_SERVICE: &str = "media-service";
pub const SEARCH_SERVICE: &str = "search-service";

/// Bind every handler. Handles already created are dropped, and so
/// stopped, if a later binding fails.
///
/// # Errors
///
/// The first binding error.
pub async fn start_subscriptions(
    container: &PlatformContainer,
    bus: &BusSettings,
) -> Result<Vec<SubscriptionHandle>, BusError> {
    let consumer_config = bus.consumer_config();
    let media = EventConsumer::new(Arc::clone(&container.media_bus), consumer_config.clone());
    let search = EventConsumer::new(Arc::clone(&container.search_bus), consumer_config);

    let cleanup: Arc<dyn EventHandler> = Arc::new(PostDeletedCleanup::new(
        container.media_repository.clone(),
        container.media_storage.clone(),
    ));
    let indexer: Arc<dyn EventHandler> = Arc::new(PostCreatedIndexer::new(
        container.search_index.clone(),
        Arc::clone(&container.cache),
    ));
    let unindexer: Arc<dyn EventHandler> = Arc::new(PostDeletedIndexer::new(
        container.search_index.clone(),
        Arc::clone(&container.cache),
    ));

    let routes = [
        (&media, MEDIA_SERVICE, routing_keys::POST_DELETED, cleanup),
        (&search, SEARCH_SERVICE, routing_keys::POST_CREATED, indexer),
        (&search, SEARCH_SERVICE, routing_keys::POST_DELETED, unindexer),
    ];

    let mut handles = Vec::with_capacity(routes.len());
    for (consumer, service, pattern, handler) in routes {
        let handle = consumer
            .subscribe(bus.subscription(service, pattern), handler)
            .await?;
        info!(service, pattern, handler = handle.handler(), "Subscribed");
        handles.push(handle);
    }
    Ok(handles)
}
