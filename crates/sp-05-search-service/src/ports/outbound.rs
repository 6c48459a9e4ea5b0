//! # Outbound Ports

use async_trait::async_trait;
use shared_types::entities::{PostId, SearchDocument};

use crate::domain::{IndexError, SearchQuery};

#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Insert or replace the document for its post id.
    async fn upsert(&self, document: SearchDocument) -> Result<(), IndexError>;

    /// Remove a document; `false` if it was not indexed.
    async fn remove(&self, post_id: &PostId) -> Result<bool, IndexError>;

    /// Matching documents, newest first.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchDocument>, IndexError>;
}
