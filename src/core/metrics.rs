// src/core/metrics.rs

//! Defines and registers Prometheus metrics for server monitoring.
//!
//! Metrics are registered once, lazily, for the entire process lifetime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec,
    register_histogram, Counter, CounterVec, Gauge, GaugeVec, Histogram, TextEncoder,
};

// --- Blocking query engine ---
pub static BLOCKING_QUERIES_PARKED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "orchcore_blocking_queries_parked",
        "Number of blocking queries currently waiting on a watch set."
    )
    .unwrap()
});

// --- ACL resolver & cache ---
pub static ACL_CACHE_HITS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "orchcore_acl_cache_hits_total",
        "Total number of capability-set cache hits."
    )
    .unwrap()
});
pub static ACL_CACHE_MISSES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "orchcore_acl_cache_misses_total",
        "Total number of capability-set cache misses."
    )
    .unwrap()
});

// --- Deployment watcher ---
pub static DEPLOYMENT_WATCHERS_ACTIVE: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "orchcore_deployment_watchers_active",
        "Number of per-deployment watchers currently running."
    )
    .unwrap()
});
pub static DEPLOYMENT_TRANSITIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "orchcore_deployment_transitions_total",
        "Total deployment status transitions, labeled by resulting status.",
        &["status"]
    )
    .unwrap()
});

// --- Raft apply wrapper ---
pub static RAFT_APPLIES_IN_FLIGHT: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "orchcore_raft_applies_in_flight",
        "Number of raft apply calls awaiting commit."
    )
    .unwrap()
});
pub static RAFT_APPLY_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "orchcore_raft_apply_errors_total",
        "Total raft apply failures, labeled by whether they were retryable.",
        &["retryable"]
    )
    .unwrap()
});

// --- Forwarding layer ---
pub static FORWARD_HOPS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "orchcore_forward_hops",
        "Number of forward hops an RPC traversed before executing locally."
    )
    .unwrap()
});

// --- Rate limiting ---
pub static RATE_LIMIT_REJECTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "orchcore_rate_limit_rejections_total",
        "Total actions dropped by a token-bucket rate limiter, labeled by subject.",
        &["subject"]
    )
    .unwrap()
});

// --- Cross-region replication ---
pub static REPLICATION_LAG: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "orchcore_replication_lag_index",
        "Difference between the authoritative region's index and the last index applied locally, by entity kind.",
        &["kind"]
    )
    .unwrap()
});

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap()
}
