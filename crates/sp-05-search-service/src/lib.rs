//! # Search Service (Subsystem 5)
//!
//! Keeps a denormalized copy of every post and answers content queries.
//!
//! ```text
//! post.created ──→ PostCreatedIndexer ──→ SearchIndex::upsert ─┐
//! post.deleted ──→ PostDeletedIndexer ──→ SearchIndex::remove ─┴─→ invalidate search:*
//!
//! search(q) ──→ ReadThroughCache(search:<q>) ──→ SearchIndex::search
//! ```
//!
//! Both indexers are idempotent: documents are keyed by post id.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod handler;
pub mod ports;
pub mod service;

pub use adapters::InMemorySearchIndex;
pub use domain::{IndexError, SearchError, SearchQuery};
pub use handler::{PostCreatedIndexer, PostDeletedIndexer};
pub use ports::{SearchApi, SearchIndex};
pub use service::SearchService;
