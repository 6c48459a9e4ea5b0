//! Adapters layer for the media subsystem.

pub mod memory;

pub use memory::{InMemoryMediaRepository, InMemoryObjectStorage};
