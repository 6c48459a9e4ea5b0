//! # Search Service
//!
//! Cached query path over the [`SearchIndex`].

use async_trait::async_trait;
use shared_cache::keys;
use shared_cache::{CacheStore, CachedJson, ReadThroughCache};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{SearchError, SearchQuery};
use crate::ports::{SearchApi, SearchIndex};

pub struct SearchService {
    index: Arc<dyn SearchIndex>,
    cache: ReadThroughCache,
    ttl: Duration,
}

impl SearchService {
    pub fn new(index: Arc<dyn SearchIndex>, store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            index,
            cache: ReadThroughCache::new(store),
            ttl,
        }
    }
}

#[async_trait]
impl SearchApi for SearchService {
    async fn search(&self, query: &str) -> Result<CachedJson, SearchError> {
        let query = SearchQuery::parse(query)?;
        let index = &self.index;
        let q = &query;
        self.cache
            .get_or_load(&keys::search(query.as_str()), self.ttl, move || async move {
                Ok::<_, SearchError>(index.search(q).await?)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemorySearchIndex;
    use crate::handler::PostCreatedIndexer;
    use chrono::Utc;
    use shared_bus::{routing_keys, DomainEvent, EventHandler, PostCreatedPayload};
    use shared_cache::{CacheSource, InMemoryCacheStore};
    use shared_types::entities::{PostId, SearchDocument, UserId};
    use shared_types::time::ManualTimeSource;

    #[tokio::test]
    async fn test_search_caches_until_index_changes() {
        let index = Arc::new(InMemorySearchIndex::new());
        let clock = Arc::new(ManualTimeSource::new(0));
        let store = Arc::new(InMemoryCacheStore::with_clock(clock));
        let service = SearchService::new(index.clone(), store.clone(), keys::SEARCH_TTL);
        let indexer = PostCreatedIndexer::new(index, store.clone());

        let empty = service.search("Hello").await.unwrap();
        assert_eq!(empty.source, CacheSource::Miss);
        assert_eq!(empty.body, "[]");
        assert!(service.search("hello").await.unwrap().is_hit());
        assert_eq!(store.ttl("search:hello"), Some(keys::SEARCH_TTL));

        let event = DomainEvent::new(
            routing_keys::POST_CREATED,
            &PostCreatedPayload {
                post_id: PostId::new("p1"),
                user_id: UserId::new("u1"),
                content: "Hello world".to_string(),
                created_at: Utc::now(),
            },
        )
        .unwrap();
        indexer.handle(&event).await.unwrap();

        let found = service.search("hello").await.unwrap();
        assert_eq!(found.source, CacheSource::Miss);
        let docs: Vec<SearchDocument> = found.parse().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].post_id, PostId::new("p1"));
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected() {
        let service = SearchService::new(
            Arc::new(InMemorySearchIndex::new()),
            Arc::new(InMemoryCacheStore::new()),
            keys::SEARCH_TTL,
        );
        assert!(matches!(
            service.search("  ").await,
            Err(SearchError::Validation(_))
        ));
    }
}
