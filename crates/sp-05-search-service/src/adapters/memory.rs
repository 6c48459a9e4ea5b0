//! In-memory search index.

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::entities::{PostId, SearchDocument};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::{IndexError, SearchQuery};
use crate::ports::SearchIndex;

#[derive(Default)]
pub struct InMemorySearchIndex {
    documents: RwLock<HashMap<PostId, SearchDocument>>,
    unavailable: AtomicBool,
}

impl InMemorySearchIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn contains(&self, post_id: &PostId) -> bool {
        self.documents.read().contains_key(post_id)
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), IndexError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IndexError::Unavailable(
                "search index unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn upsert(&self, document: SearchDocument) -> Result<(), IndexError> {
        self.check()?;
        self.documents
            .write()
            .insert(document.post_id.clone(), document);
        Ok(())
    }

    async fn remove(&self, post_id: &PostId) -> Result<bool, IndexError> {
        self.check()?;
        Ok(self.documents.write().remove(post_id).is_some())
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchDocument>, IndexError> {
        self.check()?;
        let mut hits: Vec<SearchDocument> = self
            .documents
            .read()
            .values()
            .filter(|doc| query.matches(&doc.content))
            .cloned()
            .collect();
        hits.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.post_id.cmp(&a.post_id))
        });
        Ok(hits)
    }
}
