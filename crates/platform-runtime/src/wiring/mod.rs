//! # Event Wiring
//!
//! ```text
//! post.created ──→ search: PostCreatedIndexer
//! post.deleted ──→ media:  PostDeletedCleanup
//!              └─→ search: PostDeletedIndexer
//! ```

pub mod subscriptions;

pub use subscriptions::start_subscriptions;
