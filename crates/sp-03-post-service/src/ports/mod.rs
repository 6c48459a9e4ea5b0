//! Ports layer for the post subsystem.

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
