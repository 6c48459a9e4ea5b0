//! Service construction.

use shared_bus::{BusClient, BusError, BusPublisher, Transport};
use shared_cache::CacheStore;
use sp_03_post_service::{InMemoryPostRepository, PostService};
use sp_04_media_service::{InMemoryMediaRepository, InMemoryObjectStorage, MediaService};
use sp_05_search_service::{InMemorySearchIndex, SearchService};
use std::sync::Arc;
use tracing::info;

use super::config::PlatformConfig;

/// Every service, its bus client and its stores.
pub struct PlatformContainer {
    pub post: Arc<PostService>,
    pub post_bus: Arc<BusClient>,
    pub post_repository: Arc<InMemoryPostRepository>,

    pub media: Arc<MediaService>,
    pub media_bus: Arc<BusClient>,
    pub media_repository: Arc<InMemoryMediaRepository>,
    pub media_storage: Arc<InMemoryObjectStorage>,

    pub search: Arc<SearchService>,
    pub search_bus: Arc<BusClient>,
    pub search_index: Arc<InMemorySearchIndex>,

    pub cache: Arc<dyn CacheStore>,
}

impl PlatformContainer {
    /// Connect one bus client per service and build the services.
    ///
    /// # Errors
    ///
    /// The first `BusError` from connecting or asserting the exchange.
    pub async fn build(
        config: &PlatformConfig,
        transport: Arc<dyn Transport>,
        cache: Arc<dyn CacheStore>,
    ) -> Result<Self, BusError> {
        let bus_config = config.bus.bus_config();
        let ttls = config.cache.ttls;

        let post_bus = BusClient::connect(Arc::clone(&transport), bus_config.clone()).await?;
        let post_repository = Arc::new(InMemoryPostRepository::new());
        let post = Arc::new(PostService::new(
            post_repository.clone(),
            Arc::clone(&cache),
            Arc::new(BusPublisher::new(Arc::clone(&post_bus))),
            ttls,
        ));

        let media_bus = BusClient::connect(Arc::clone(&transport), bus_config.clone()).await?;
        let media_repository = Arc::new(InMemoryMediaRepository::new());
        let media_storage = Arc::new(InMemoryObjectStorage::new());
        let media = Arc::new(MediaService::new(
            media_repository.clone(),
            media_storage.clone(),
        ));

        let search_bus = BusClient::connect(transport, bus_config).await?;
        let search_index = Arc::new(InMemorySearchIndex::new());
        let search = Arc::new(SearchService::new(
            search_index.clone(),
            Arc::clone(&cache),
            ttls.search,
        ));

        info!(exchange = %config.bus.exchange, "Services initialized");

        Ok(Self {
            post,
            post_bus,
            post_repository,
            media,
            media_bus,
            media_repository,
            media_storage,
            search,
            search_bus,
            search_index,
            cache,
        })
    }

    /// Close every bus client.
    pub async fn close(&self) {
        for client in [&self.post_bus, &self.media_bus, &self.search_bus] {
            client.close().await;
        }
    }
}
