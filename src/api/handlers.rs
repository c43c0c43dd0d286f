use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dispatch::{SubmitOutcome, SubmitRequest, SweepReport};
use crate::error::{AppError, Result};
use crate::notification::{EventType, Notification, NotificationStatus};
use crate::server::{caller_key, rate_limited_response, AppState};
use crate::store::{AggregateStats, NotificationFilter};

/// Response for notification send operations
#[derive(Debug, Serialize)]
pub struct SendResponse {
    /// Where the record landed after its first attempt
    pub status: NotificationStatus,
    /// Notification ID
    pub notification_id: Uuid,
    /// Delivery attempts completed so far
    pub attempts: u32,
    /// Failure detail, present unless the attempt delivered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Query parameters for listing notifications
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Restrict to one recipient
    pub user_id: Option<Uuid>,
    /// Restrict to one event type
    pub event_type: Option<EventType>,
}

/// Response for notification listings
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub notifications: Vec<Notification>,
    pub count: usize,
}

/// Send a notification for a domain event
///
/// Runs the whole pipeline inline and answers 202 with the resulting
/// record state, or 429 when the rate limiter refuses the caller.
pub async fn send_notification(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<SubmitRequest>,
) -> Result<Response> {
    let caller = caller_key(&headers, addr.ip());

    match state.engine.submit(&caller, request).await? {
        SubmitOutcome::Completed {
            notification,
            reason,
        } => {
            let body = SendResponse {
                status: notification.status,
                notification_id: notification.id,
                attempts: notification.attempts,
                reason,
            };
            Ok((StatusCode::ACCEPTED, Json(body)).into_response())
        }
        SubmitOutcome::Rejected {
            retry_after,
            limit,
            reset_at,
        } => {
            tracing::warn!(caller = %caller, retry_after, "Rate limit exceeded");
            Ok(rate_limited_response(retry_after, limit, reset_at))
        }
    }
}

/// Fetch one notification by id
pub async fn get_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>> {
    let notification = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))?;

    Ok(Json(notification))
}

/// List notifications, optionally filtered by recipient and event type
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>> {
    let filter = NotificationFilter {
        user_id: query.user_id,
        event_type: query.event_type,
    };
    let notifications = state.store.list(&filter).await?;
    let count = notifications.len();

    Ok(Json(ListResponse {
        notifications,
        count,
    }))
}

/// Aggregate counts across all stored notifications
pub async fn notification_stats(
    State(state): State<AppState>,
) -> Result<Json<AggregateStats>> {
    Ok(Json(state.store.aggregate_stats().await?))
}

/// Run one retry sweep on demand and report what it did
pub async fn retry_notifications(State(state): State<AppState>) -> Result<Json<SweepReport>> {
    let report = state.sweeper.sweep_once().await?;
    Ok(Json(report))
}
