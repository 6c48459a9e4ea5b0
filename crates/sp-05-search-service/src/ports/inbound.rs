//! # Inbound Port - SearchApi

use async_trait::async_trait;
use shared_cache::CachedJson;

use crate::domain::SearchError;

#[async_trait]
pub trait SearchApi: Send + Sync {
    /// JSON array of matching documents, newest first.
    async fn search(&self, query: &str) -> Result<CachedJson, SearchError>;
}
