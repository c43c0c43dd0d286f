use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::server::{api_key_auth, AppState};

use super::handlers::{
    get_notification, list_notifications, notification_stats, retry_notifications,
    send_notification,
};
use super::health::{health, stats};

pub fn api_routes(state: AppState) -> Router<AppState> {
    // Mutating endpoints sit behind the API key guard; reads stay open
    let guarded = Router::new()
        .route("/notifications/send", post(send_notification))
        .route("/notifications/retry", post(retry_notifications))
        .route_layer(middleware::from_fn_with_state(state, api_key_auth));

    let open = Router::new()
        .route("/notifications", get(list_notifications))
        // Static route must be registered alongside the {id} matcher
        .route("/notifications/stats", get(notification_stats))
        .route("/notifications/{id}", get(get_notification));

    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        // Notification endpoints
        .nest("/api/v1", guarded.merge(open))
}
