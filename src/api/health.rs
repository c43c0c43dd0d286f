//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::dispatch::EngineStatsSnapshot;
use crate::error::Result;
use crate::gateway::Channel;
use crate::ratelimit::RateLimiterStats;
use crate::server::AppState;
use crate::store::AggregateStats;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub store: StoreHealthResponse,
    pub directory: DirectoryHealthResponse,
    pub gateway: GatewayHealthResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratelimit: Option<RateLimitHealthResponse>,
}

#[derive(Debug, Serialize)]
pub struct StoreHealthResponse {
    pub status: String,
    pub backend: String,
    pub connected: bool,
}

#[derive(Debug, Serialize)]
pub struct DirectoryHealthResponse {
    pub backend: String,
    pub cached_entries: usize,
}

#[derive(Debug, Serialize)]
pub struct GatewayHealthResponse {
    pub backend: String,
    pub email_breaker: String,
    pub sms_breaker: String,
}

#[derive(Debug, Serialize)]
pub struct RateLimitHealthResponse {
    pub limit: u32,
    pub window_seconds: u64,
    pub active_callers: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub notifications: AggregateStats,
    pub engine: EngineStatsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratelimit: Option<RateLimiterStats>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_connected = state.store.ping().await.is_ok();
    let uptime_seconds = state.start_time.elapsed().as_secs();

    let ratelimit = state.rate_limiter.as_ref().map(|limiter| {
        let stats = limiter.stats();
        RateLimitHealthResponse {
            limit: stats.limit,
            window_seconds: stats.window_seconds,
            active_callers: stats.active_callers,
        }
    });

    let status = if store_connected { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        store: StoreHealthResponse {
            status: if store_connected {
                "connected".to_string()
            } else {
                "unavailable".to_string()
            },
            backend: state.store.backend_name().to_string(),
            connected: store_connected,
        },
        directory: DirectoryHealthResponse {
            backend: state.settings.directory.backend.clone(),
            cached_entries: state.directory.cached_entries(),
        },
        gateway: GatewayHealthResponse {
            backend: state.settings.gateway.backend.clone(),
            email_breaker: breaker_state_name(&state, Channel::Email),
            sms_breaker: breaker_state_name(&state, Channel::Sms),
        },
        ratelimit,
    })
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let notifications = state.store.aggregate_stats().await?;
    let engine = state.engine.stats();
    let ratelimit = state.rate_limiter.as_ref().map(|limiter| limiter.stats());

    Ok(Json(StatsResponse {
        notifications,
        engine,
        ratelimit,
    }))
}

fn breaker_state_name(state: &AppState, channel: Channel) -> String {
    state
        .gateway
        .breaker_stats(channel)
        .state
        .as_str()
        .to_string()
}
