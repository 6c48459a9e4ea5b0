//! Event handlers for the search subsystem.

pub mod indexer;

pub use indexer::{PostCreatedIndexer, PostDeletedIndexer};
