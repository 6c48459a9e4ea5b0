//! Prometheus metrics for the social platform services.
//!
//! All metrics follow the naming convention: `sp_<area>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // EVENT BUS METRICS
    // =========================================================================

    /// Events handed to the broker
    pub static ref EVENTS_PUBLISHED: CounterVec = CounterVec::new(
        Opts::new("sp_bus_events_published_total", "Events published to the topic exchange"),
        &["routing_key"]
    ).expect("metric creation failed");

    /// Publishes that failed and were surfaced to the caller
    pub static ref PUBLISH_FAILURES: CounterVec = CounterVec::new(
        Opts::new("sp_bus_publish_failures_total", "Publish attempts that failed"),
        &["routing_key"]
    ).expect("metric creation failed");

    /// Consumed deliveries by handler and acknowledgment outcome
    pub static ref EVENTS_CONSUMED: CounterVec = CounterVec::new(
        Opts::new("sp_bus_events_consumed_total", "Deliveries processed by a handler"),
        &["handler", "outcome"]  // outcome: ack/requeue/dead_letter/drop
    ).expect("metric creation failed");

    /// Successful channel (re)establishments
    pub static ref BUS_RECONNECTS: Counter = Counter::new(
        "sp_bus_reconnects_total",
        "Number of times a bus channel was established"
    ).expect("metric creation failed");

    /// Handler execution time
    pub static ref HANDLER_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "sp_bus_handler_duration_seconds",
            "Time spent inside event handlers"
        ).buckets(exponential_buckets(0.0005, 2.0, 14).expect("valid buckets")),
        &["handler"]
    ).expect("metric creation failed");

    // =========================================================================
    // CACHE METRICS
    // =========================================================================

    /// Read-through lookups by outcome
    pub static ref CACHE_LOOKUPS: CounterVec = CounterVec::new(
        Opts::new("sp_cache_lookups_total", "Read-through cache lookups"),
        &["outcome"]  // outcome: hit/miss/error
    ).expect("metric creation failed");

    /// Keys removed by the invalidation coordinator
    pub static ref CACHE_INVALIDATED_KEYS: Counter = Counter::new(
        "sp_cache_invalidated_keys_total",
        "Cache keys deleted by invalidation"
    ).expect("metric creation failed");

    /// Invalidation steps that failed (logged, mutation still succeeds)
    pub static ref CACHE_INVALIDATION_FAILURES: Counter = Counter::new(
        "sp_cache_invalidation_failures_total",
        "Cache invalidation steps that failed"
    ).expect("metric creation failed");

    // =========================================================================
    // MEDIA CLEANUP METRICS
    // =========================================================================

    /// Dependent media processed by the post-deleted cleanup
    pub static ref MEDIA_CLEANUP: CounterVec = CounterVec::new(
        Opts::new("sp_media_cleanup_total", "Media items processed by cleanup"),
        &["outcome"]  // outcome: deleted/already_gone
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; collectors that are already registered are
/// left alone.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Event bus
        Box::new(EVENTS_PUBLISHED.clone()),
        Box::new(PUBLISH_FAILURES.clone()),
        Box::new(EVENTS_CONSUMED.clone()),
        Box::new(BUS_RECONNECTS.clone()),
        Box::new(HANDLER_DURATION.clone()),
        // Cache
        Box::new(CACHE_LOOKUPS.clone()),
        Box::new(CACHE_INVALIDATED_KEYS.clone()),
        Box::new(CACHE_INVALIDATION_FAILURES.clone()),
        // Media
        Box::new(MEDIA_CLEANUP.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
