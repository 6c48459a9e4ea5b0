//! In-memory post repository.

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::entities::{PostId, PostRecord};
use shared_types::pagination::{Page, PageRequest};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::RepositoryError;
use crate::ports::PostRepository;

/// Posts held in a map, with an outage switch for failure tests.
#[derive(Default)]
pub struct InMemoryPostRepository {
    posts: RwLock<HashMap<PostId, PostRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryPostRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// While `false`, every call fails with `RepositoryError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.posts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "post store unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn insert(&self, post: PostRecord) -> Result<(), RepositoryError> {
        self.check()?;
        self.posts.write().insert(post.id.clone(), post);
        Ok(())
    }

    async fn find(&self, id: &PostId) -> Result<Option<PostRecord>, RepositoryError> {
        self.check()?;
        Ok(self.posts.read().get(id).cloned())
    }

    async fn list(&self, page: &PageRequest) -> Result<Page<PostRecord>, RepositoryError> {
        self.check()?;
        let mut all: Vec<PostRecord> = self.posts.read().values().cloned().collect();
        all.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(Page::from_sorted(all, *page))
    }

    async fn delete(&self, id: &PostId) -> Result<bool, RepositoryError> {
        self.check()?;
        Ok(self.posts.write().remove(id).is_some())
    }
}
