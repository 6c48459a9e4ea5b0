//! # Inbound Port - PostApi
//!
//! What the HTTP layer calls. Read operations return the JSON body to send,
//! so a cache hit is served without a parse and re-serialize round trip.

use async_trait::async_trait;
use shared_cache::CachedJson;
use shared_types::entities::{PostId, PostRecord, UserId};
use shared_types::pagination::PageRequest;

use crate::domain::{NewPost, PostError};

#[async_trait]
pub trait PostApi: Send + Sync {
    /// Persist a post, clear cached lists and publish `post.created`.
    ///
    /// # Errors
    /// - `Validation`: blank content
    /// - `Store`: the repository write failed; nothing else happened
    /// - `Publish`: the post exists but `post.created` was not sent
    async fn create_post(&self, post: NewPost) -> Result<PostRecord, PostError>;

    /// `post:<id>` body. Not found is never cached.
    async fn get_post(&self, id: &PostId) -> Result<CachedJson, PostError>;

    /// `posts:<page>:<limit>` body, newest first.
    async fn list_posts(&self, page: PageRequest) -> Result<CachedJson, PostError>;

    /// Delete a post owned by `user`, clear its keys and publish
    /// `post.deleted` with the media ids it carried.
    ///
    /// # Errors
    /// - `NotFound` / `NotOwner` / `Store`: nothing was deleted, invalidated
    ///   or published
    /// - `Publish`: the post is gone but `post.deleted` was not sent
    async fn delete_post(&self, id: &PostId, user: &UserId) -> Result<PostRecord, PostError>;
}
