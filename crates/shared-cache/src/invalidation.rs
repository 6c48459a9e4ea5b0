//! # Cache Invalidation Coordinator
//!
//! On a mutation, clears the single-item key and every list key of the
//! resource type. List keys are found with a prefix scan, so one write
//! drops every cached page regardless of which pages it actually touched.
//!
//! Invalidation never fails the mutation that triggered it. Errors are
//! logged at `error` and reported; entries that survive are bounded by
//! their TTL.

use std::sync::Arc;
use tracing::{debug, error};

use crate::store::CacheStore;

/// Keys and glob patterns to clear together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationScope {
    keys: Vec<String>,
    patterns: Vec<String>,
}

impl InvalidationScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.keys.push(key.into());
        self
    }

    #[must_use]
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// Result of one invalidation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    /// Keys that existed and were deleted.
    pub deleted: u64,
    /// One message per failed step.
    pub failures: Vec<String>,
}

impl InvalidationReport {
    /// Every step succeeded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct InvalidationCoordinator {
    store: Arc<dyn CacheStore>,
}

impl InvalidationCoordinator {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Delete every key in `scope`. Later steps still run when an earlier
    /// one fails.
    pub async fn invalidate(&self, scope: &InvalidationScope) -> InvalidationReport {
        let mut report = InvalidationReport::default();

        if !scope.keys.is_empty() {
            self.delete(&scope.keys, &mut report).await;
        }

        for pattern in &scope.patterns {
            match self.store.keys(pattern).await {
                Ok(matched) if matched.is_empty() => {}
                Ok(matched) => self.delete(&matched, &mut report).await,
                Err(e) => {
                    social_telemetry::CACHE_INVALIDATION_FAILURES.inc();
                    error!(pattern = %pattern, error = %e, "Cache key scan failed");
                    report.failures.push(format!("scan {pattern}: {e}"));
                }
            }
        }

        debug!(
            keys = scope.keys.len(),
            patterns = scope.patterns.len(),
            deleted = report.deleted,
            failures = report.failures.len(),
            "Cache invalidated"
        );
        report
    }

    async fn delete(&self, keys: &[String], report: &mut InvalidationReport) {
        match self.store.del(keys).await {
            Ok(deleted) => {
                social_telemetry::CACHE_INVALIDATED_KEYS.inc_by(deleted as f64);
                report.deleted += deleted;
            }
            Err(e) => {
                social_telemetry::CACHE_INVALIDATION_FAILURES.inc();
                error!(keys = ?keys, error = %e, "Cache delete failed");
                report.failures.push(format!("del {}: {e}", keys.join(",")));
            }
        }
    }
}
