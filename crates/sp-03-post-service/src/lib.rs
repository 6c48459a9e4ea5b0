//! # Post Service (Subsystem 3)
//!
//! Source of truth for posts. Reads go through the shared cache, writes
//! clear the affected keys and announce themselves on the bus.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       PostService                          │
//! │                                                            │
//! │  get_post / list_posts ──→ ReadThroughCache ──→ repository │
//! │                                                            │
//! │  create_post / delete_post                                 │
//! │     1. repository write                                    │
//! │     2. InvalidationCoordinator (post:<id>, posts:*)        │
//! │     3. EventPublisher (post.created / post.deleted)        │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Steps 2 and 3 run only after step 1 commits. A crash between 1 and 3
//! loses the event; there is no outbox.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::InMemoryPostRepository;
pub use domain::{NewPost, PostError, RepositoryError};
pub use ports::{PostApi, PostRepository};
pub use service::PostService;
