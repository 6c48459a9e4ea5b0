//! Event handlers for the media subsystem.

pub mod cleanup;

pub use cleanup::PostDeletedCleanup;
