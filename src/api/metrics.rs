//! Prometheus metrics endpoint.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use crate::gateway::Channel;
use crate::metrics::{self, DeliveryMetrics, NotificationMetrics, RateLimitMetrics};
use crate::notification::NotificationStatus;
use crate::server::AppState;

/// GET /metrics - Prometheus metrics endpoint
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    update_metrics_from_state(&state).await;

    match metrics::encode_metrics() {
        Ok(output) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode Prometheus metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(axum::http::header::CONTENT_TYPE, "text/plain")],
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

/// Update Prometheus gauges from AppState
async fn update_metrics_from_state(state: &AppState) {
    // Notification status gauges
    match state.store.aggregate_stats().await {
        Ok(stats) => {
            NotificationMetrics::set_current(
                NotificationStatus::Pending.as_str(),
                stats.by_status.pending,
            );
            NotificationMetrics::set_current(
                NotificationStatus::Retrying.as_str(),
                stats.by_status.retrying,
            );
            NotificationMetrics::set_current(
                NotificationStatus::Sent.as_str(),
                stats.by_status.sent,
            );
            NotificationMetrics::set_current(
                NotificationStatus::Failed.as_str(),
                stats.by_status.failed,
            );
        }
        Err(e) => {
            tracing::warn!(error = %e, "Skipping status gauges, store stats unavailable");
        }
    }

    // Gateway circuit breaker gauges
    for channel in [Channel::Email, Channel::Sms] {
        let breaker = state.gateway.breaker_stats(channel);
        DeliveryMetrics::set_breaker_state(channel.as_str(), breaker.state.as_gauge_value());
    }

    // Rate limiter gauges
    if let Some(limiter) = &state.rate_limiter {
        RateLimitMetrics::set_active_windows(limiter.stats().active_callers);
    }
}
