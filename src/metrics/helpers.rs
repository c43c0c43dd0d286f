//! Typed recording helpers over the raw metric statics.

use prometheus::{Encoder, TextEncoder};

use super::*;

/// Encode all registered metrics in Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).to_string())
}

/// Notification lifecycle metrics
pub struct NotificationMetrics;

impl NotificationMetrics {
    pub fn record_created() {
        NOTIFICATIONS_CREATED_TOTAL.inc();
    }

    /// Refresh the per-status gauges from an aggregate snapshot.
    pub fn set_current(status: &str, count: u64) {
        NOTIFICATIONS_CURRENT
            .with_label_values(&[status])
            .set(count as i64);
    }
}

/// Delivery pipeline metrics
pub struct DeliveryMetrics;

impl DeliveryMetrics {
    /// `result` is one of `delivered`, `retryable`, `exhausted`, `permanent`.
    pub fn record_attempt(result: &str) {
        DELIVERY_ATTEMPTS_TOTAL.with_label_values(&[result]).inc();
    }

    pub fn record_channel(channel: &str, outcome: &str) {
        DELIVERIES_TOTAL.with_label_values(&[channel, outcome]).inc();
    }

    pub fn observe_duration(seconds: f64) {
        DELIVERY_DURATION.observe(seconds);
    }

    pub fn set_breaker_state(channel: &str, state: i64) {
        GATEWAY_CIRCUIT_BREAKER_STATE
            .with_label_values(&[channel])
            .set(state);
    }
}

/// Retry sweep metrics
pub struct SweepMetrics;

impl SweepMetrics {
    pub fn record_sweep(retried: usize, duration_seconds: f64) {
        SWEEPS_TOTAL.inc();
        SWEEP_RETRIED_TOTAL.inc_by(retried as u64);
        SWEEP_DURATION.observe(duration_seconds);
    }
}

/// Rate limiting metrics
pub struct RateLimitMetrics;

impl RateLimitMetrics {
    pub fn record_allowed() {
        RATELIMIT_ALLOWED_TOTAL.inc();
    }

    pub fn record_denied() {
        RATELIMIT_DENIED_TOTAL.inc();
    }

    pub fn set_active_windows(count: usize) {
        RATELIMIT_ACTIVE_WINDOWS.set(count as i64);
    }
}

/// Directory cache metrics
pub struct DirectoryMetrics;

impl DirectoryMetrics {
    pub fn record_cache_hit() {
        DIRECTORY_CACHE_HITS_TOTAL.inc();
    }

    pub fn record_cache_miss() {
        DIRECTORY_CACHE_MISSES_TOTAL.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helpers_do_not_panic() {
        NotificationMetrics::record_created();
        NotificationMetrics::set_current("PENDING", 2);
        DeliveryMetrics::record_attempt("delivered");
        DeliveryMetrics::record_channel("sms", "error");
        DeliveryMetrics::observe_duration(0.5);
        DeliveryMetrics::set_breaker_state("sms", 1);
        SweepMetrics::record_sweep(2, 0.1);
        RateLimitMetrics::record_allowed();
        RateLimitMetrics::record_denied();
        RateLimitMetrics::set_active_windows(1);
        DirectoryMetrics::record_cache_hit();
        DirectoryMetrics::record_cache_miss();
    }

    #[test]
    fn test_encode_includes_labels() {
        DeliveryMetrics::record_channel("email", "ok");
        let output = encode_metrics().unwrap();
        assert!(output.contains("gojo_deliveries_total"));
    }
}
