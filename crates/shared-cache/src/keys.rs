//! Cache key definitions.
//!
//! Keys are namespaced by resource type and query shape. List keys encode
//! page and page size; each resource type has one prefix that covers all of
//! its list keys so a mutation can clear them with a single scan.

use shared_types::entities::PostId;
use shared_types::pagination::PageRequest;
use std::time::Duration;

/// Glob covering every cached post list.
pub const POST_LISTS_PATTERN: &str = "posts:*";

/// Glob covering every cached search result.
pub const SEARCH_RESULTS_PATTERN: &str = "search:*";

/// Default TTL of a single post.
pub const POST_TTL: Duration = Duration::from_secs(3600);

/// Default TTL of a post list page.
pub const POST_LIST_TTL: Duration = Duration::from_secs(300);

/// Default TTL of a search result.
pub const SEARCH_TTL: Duration = Duration::from_secs(180);

/// `post:<id>`
pub fn post(id: &PostId) -> String {
    format!("post:{id}")
}

/// `posts:<page>:<limit>`
pub fn post_list(page: &PageRequest) -> String {
    format!("posts:{}:{}", page.page(), page.limit())
}

/// `search:<query>`
pub fn search(query: &str) -> String {
    format!("search:{query}")
}

/// TTLs per key family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub post: Duration,
    pub post_list: Duration,
    pub search: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            post: POST_TTL,
            post_list: POST_LIST_TTL,
            search: SEARCH_TTL,
        }
    }
}
