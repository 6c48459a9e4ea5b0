//! Ports layer for the media subsystem.

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
