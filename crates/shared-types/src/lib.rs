//! # Shared Types Crate
//!
//! Identifiers, records and pagination types shared by the post, media and
//! search services.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: records that cross a service boundary (in an
//!   event payload or a cached JSON body) are defined here once.
//! - **Opaque identifiers**: ids are strings on the wire; the newtypes only
//!   stop a `PostId` from being passed where a `MediaId` is expected.
//! - **Injectable time**: TTL and ordering logic reads time through
//!   [`TimeSource`] so tests can drive the clock.

pub mod entities;
pub mod errors;
pub mod pagination;
pub mod time;

pub use entities::*;
pub use errors::*;
pub use pagination::*;
pub use time::*;
