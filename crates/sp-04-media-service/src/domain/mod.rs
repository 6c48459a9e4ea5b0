//! Domain layer for the media subsystem.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
