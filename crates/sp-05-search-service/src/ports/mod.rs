//! Ports layer for the search subsystem.

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
