//! Adapters layer for the search subsystem.

pub mod memory;

pub use memory::InMemorySearchIndex;
