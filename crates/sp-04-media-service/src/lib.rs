//! # Media Service (Subsystem 4)
//!
//! Owns uploaded media: the record in its store and the blob in object
//! storage.
//!
//! ## Cleanup
//!
//! ```text
//! post.deleted { postId, userId, mediaIds }
//!        │
//!        ▼
//! PostDeletedCleanup, per media id:
//!   record lookup ──→ ObjectStorage::delete_object(public_id) ──→ record delete
//!        │                     │
//!   missing: skip        NotFound: continue
//! ```
//!
//! Every step tolerates "already gone", so a redelivered event is a no-op.
//! Any other failure fails the handler and the consumer requeues, then
//! dead-letters.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod handler;
pub mod ports;
pub mod service;

pub use adapters::{InMemoryMediaRepository, InMemoryObjectStorage};
pub use domain::{MediaError, RepositoryError, StorageError, UploadRequest};
pub use handler::PostDeletedCleanup;
pub use ports::{DeleteOutcome, MediaApi, MediaRepository, ObjectStorage, StoredObject};
pub use service::MediaService;
