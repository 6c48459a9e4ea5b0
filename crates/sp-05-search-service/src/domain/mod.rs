//! Domain layer for the search subsystem.

pub mod errors;
pub mod query;

pub use errors::*;
pub use query::*;
