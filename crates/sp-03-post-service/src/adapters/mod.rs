//! Adapters layer for the post subsystem.

pub mod memory;

pub use memory::InMemoryPostRepository;
