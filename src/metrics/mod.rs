//! Prometheus metrics for the notification service.
//!
//! This module provides metrics for monitoring the dispatch pipeline:
//! - Notification lifecycle metrics (created, current counts by status)
//! - Delivery metrics (attempts by result, per-channel outcomes, latency)
//! - Retry sweep metrics (sweeps, retried records, sweep duration)
//! - Rate limiting metrics
//! - Directory cache metrics

mod helpers;

pub use helpers::{
    encode_metrics, DeliveryMetrics, DirectoryMetrics, NotificationMetrics, RateLimitMetrics,
    SweepMetrics,
};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, register_int_gauge_vec, Histogram, HistogramVec, IntCounter, IntCounterVec,
    IntGauge, IntGaugeVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "gojo";

lazy_static! {
    // ============================================================================
    // Notification Lifecycle Metrics
    // ============================================================================

    /// Total notification records created
    pub static ref NOTIFICATIONS_CREATED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_created_total", METRIC_PREFIX),
        "Total notification records created"
    ).unwrap();

    /// Current number of notifications by status
    pub static ref NOTIFICATIONS_CURRENT: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_notifications_current", METRIC_PREFIX),
        "Current number of notifications by status",
        &["status"]
    ).unwrap();

    // ============================================================================
    // Delivery Metrics
    // ============================================================================

    /// Completed delivery attempts by result
    pub static ref DELIVERY_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_delivery_attempts_total", METRIC_PREFIX),
        "Completed delivery attempts",
        &["result"]
    ).unwrap();

    /// Per-channel delivery outcomes
    pub static ref DELIVERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_deliveries_total", METRIC_PREFIX),
        "Channel-level delivery outcomes",
        &["channel", "outcome"]
    ).unwrap();

    /// End-to-end duration of one delivery attempt
    pub static ref DELIVERY_DURATION: Histogram = register_histogram!(
        format!("{}_delivery_duration_seconds", METRIC_PREFIX),
        "Delivery attempt duration in seconds",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    /// Gateway circuit breaker state (0=closed, 1=open, 2=half-open)
    pub static ref GATEWAY_CIRCUIT_BREAKER_STATE: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_gateway_circuit_breaker_state", METRIC_PREFIX),
        "Gateway circuit breaker state (0=closed, 1=open, 2=half-open)",
        &["channel"]
    ).unwrap();

    // ============================================================================
    // Retry Sweep Metrics
    // ============================================================================

    /// Total retry sweeps executed
    pub static ref SWEEPS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_sweeps_total", METRIC_PREFIX),
        "Total retry sweeps executed"
    ).unwrap();

    /// Total notifications picked up by sweeps
    pub static ref SWEEP_RETRIED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_sweep_retried_total", METRIC_PREFIX),
        "Total notifications retried by sweeps"
    ).unwrap();

    /// Duration of one sweep
    pub static ref SWEEP_DURATION: Histogram = register_histogram!(
        format!("{}_sweep_duration_seconds", METRIC_PREFIX),
        "Retry sweep duration in seconds",
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0]
    ).unwrap();

    // ============================================================================
    // Rate Limiting Metrics
    // ============================================================================

    /// Requests allowed by rate limiter
    pub static ref RATELIMIT_ALLOWED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_ratelimit_allowed_total", METRIC_PREFIX),
        "Total requests allowed by rate limiter"
    ).unwrap();

    /// Requests denied by rate limiter
    pub static ref RATELIMIT_DENIED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_ratelimit_denied_total", METRIC_PREFIX),
        "Total requests denied by rate limiter"
    ).unwrap();

    /// Callers with a live rate limit window
    pub static ref RATELIMIT_ACTIVE_WINDOWS: IntGauge = register_int_gauge!(
        format!("{}_ratelimit_active_windows", METRIC_PREFIX),
        "Callers with a live rate limit window"
    ).unwrap();

    // ============================================================================
    // Directory Cache Metrics
    // ============================================================================

    /// Recipient cache hits
    pub static ref DIRECTORY_CACHE_HITS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_directory_cache_hits_total", METRIC_PREFIX),
        "Total recipient cache hits"
    ).unwrap();

    /// Recipient cache misses
    pub static ref DIRECTORY_CACHE_MISSES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_directory_cache_misses_total", METRIC_PREFIX),
        "Total recipient cache misses"
    ).unwrap();

    // ============================================================================
    // HTTP API Metrics
    // ============================================================================

    /// HTTP request counter by method and path
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_http_requests_total", METRIC_PREFIX),
        "Total HTTP requests",
        &["method", "path", "status"]
    ).unwrap();

    /// HTTP request latency
    pub static ref HTTP_REQUEST_LATENCY: HistogramVec = register_histogram_vec!(
        format!("{}_http_request_latency_seconds", METRIC_PREFIX),
        "HTTP request latency in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    ).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics() {
        // Initialize some metrics first (lazy_static requires first access)
        NOTIFICATIONS_CREATED_TOTAL.inc();

        // Verify encoding doesn't panic and contains expected prefix
        let result = encode_metrics();
        assert!(result.is_ok());
        let output = result.unwrap();
        assert!(output.contains("gojo_notifications_created_total"));
    }

    #[test]
    fn test_delivery_metrics() {
        DELIVERY_ATTEMPTS_TOTAL.with_label_values(&["delivered"]).inc();
        DELIVERIES_TOTAL.with_label_values(&["email", "ok"]).inc();
        DELIVERY_DURATION.observe(0.2);
        GATEWAY_CIRCUIT_BREAKER_STATE.with_label_values(&["email"]).set(0);
        // Just verify no panics
    }

    #[test]
    fn test_sweep_metrics() {
        SWEEPS_TOTAL.inc();
        SWEEP_RETRIED_TOTAL.inc_by(3);
        SWEEP_DURATION.observe(0.05);
        // Just verify no panics
    }

    #[test]
    fn test_ratelimit_metrics() {
        RATELIMIT_ALLOWED_TOTAL.inc();
        RATELIMIT_DENIED_TOTAL.inc();
        RATELIMIT_ACTIVE_WINDOWS.set(4);
        // Just verify no panics
    }
}
