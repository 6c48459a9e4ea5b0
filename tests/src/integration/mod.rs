//! Cross-service scenarios, each running the full platform on one
//! in-process broker and cache store.

pub mod cache_consistency;
pub mod cleanup_flow;
pub mod delivery;
pub mod reconnect;
