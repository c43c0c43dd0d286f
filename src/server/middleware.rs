use std::net::IpAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::metrics;

use super::AppState;

/// Shared-key auth for the mutating endpoints.
///
/// With no `api.key` configured every request passes, which is how
/// development and tests run. Only the send and retry routes sit behind
/// this check; reads stay open either way.
pub async fn api_key_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = &state.settings.api.key else {
        return Ok(next.run(req).await);
    };

    match req.headers().get("X-API-Key").and_then(|v| v.to_str().ok()) {
        Some(presented) if presented == expected => Ok(next.run(req).await),
        Some(_) => {
            tracing::warn!("Invalid API key provided");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("Missing API key header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Rate-limit key for a request: the X-API-Key value when one is
/// present, otherwise the peer IP. Two clients behind the same NAT
/// share a window only when neither sends a key.
pub fn caller_key(headers: &HeaderMap, peer_ip: IpAddr) -> String {
    headers
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .map(|key| key.to_string())
        .unwrap_or_else(|| peer_ip.to_string())
}

/// Request metrics middleware: counts requests and observes latency
/// per method, path and status.
pub async fn track_metrics(req: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    metrics::HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();
    metrics::HTTP_REQUEST_LATENCY
        .with_label_values(&[&method, &path])
        .observe(started.elapsed().as_secs_f64());

    response
}

/// Build a rate limit error response with proper headers
pub fn rate_limited_response(retry_after: u64, limit: u32, reset_at: i64) -> Response {
    let body = json!({
        "status": "rejected",
        "retry_after": retry_after,
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();

    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&retry_after.to_string()) {
        headers.insert("Retry-After", v);
    }
    if let Ok(v) = HeaderValue::from_str(&limit.to_string()) {
        headers.insert("X-RateLimit-Limit", v);
    }
    headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
    if let Ok(v) = HeaderValue::from_str(&reset_at.to_string()) {
        headers.insert("X-RateLimit-Reset", v);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_key_prefers_api_key_header() {
        let mut headers = HeaderMap::new();
        headers.insert("X-API-Key", HeaderValue::from_static("tenant-a"));
        let ip: IpAddr = "10.0.0.7".parse().unwrap();

        assert_eq!(caller_key(&headers, ip), "tenant-a");
    }

    #[test]
    fn caller_key_falls_back_to_peer_ip() {
        let headers = HeaderMap::new();
        let ip: IpAddr = "10.0.0.7".parse().unwrap();

        assert_eq!(caller_key(&headers, ip), "10.0.0.7");
    }

    #[test]
    fn rate_limited_response_carries_headers() {
        let response = rate_limited_response(42, 10, 1_700_000_060);

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers.get("Retry-After").unwrap(), "42");
        assert_eq!(headers.get("X-RateLimit-Limit").unwrap(), "10");
        assert_eq!(headers.get("X-RateLimit-Remaining").unwrap(), "0");
        assert_eq!(headers.get("X-RateLimit-Reset").unwrap(), "1700000060");
    }
}
