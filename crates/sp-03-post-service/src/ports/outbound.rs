//! # Outbound Ports
//!
//! Source-of-truth store for posts. Production would back this with a
//! document database; [`crate::adapters::InMemoryPostRepository`] is the
//! in-process adapter.

use async_trait::async_trait;
use shared_types::entities::{PostId, PostRecord};
use shared_types::pagination::{Page, PageRequest};

use crate::domain::RepositoryError;

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn insert(&self, post: PostRecord) -> Result<(), RepositoryError>;

    async fn find(&self, id: &PostId) -> Result<Option<PostRecord>, RepositoryError>;

    /// One page of posts, newest first.
    async fn list(&self, page: &PageRequest) -> Result<Page<PostRecord>, RepositoryError>;

    /// Remove a post; `false` if it did not exist.
    async fn delete(&self, id: &PostId) -> Result<bool, RepositoryError>;
}
