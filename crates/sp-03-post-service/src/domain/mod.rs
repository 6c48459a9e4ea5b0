//! Domain layer for the post subsystem.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
