//! # Social Platform Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs        # Platform bootstrap, test handlers, wait helpers
//! └── integration/       # Cross-service consistency scenarios
//!     ├── cleanup_flow.rs       # post.deleted → media cleanup
//!     ├── cache_consistency.rs  # TTL bound, invalidation completeness
//!     ├── delivery.rs           # fan-out, work queues, dead letters
//!     └── reconnect.rs          # broker restart and outage
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p sp-tests
//! cargo test -p sp-tests integration::delivery::
//! cargo bench -p sp-tests
//! ```

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod fixtures;
pub mod integration;
