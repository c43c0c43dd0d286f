//! API layer - HTTP endpoint handlers organized by domain.

mod handlers;
mod health;
mod metrics;
mod routes;

// Re-export all handlers for use in server/app.rs
pub use handlers::{
    get_notification, list_notifications, notification_stats, retry_notifications,
    send_notification,
};
pub use handlers::{ListQuery, ListResponse, SendResponse};
pub use health::{health, stats};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
