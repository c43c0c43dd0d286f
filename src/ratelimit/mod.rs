//! Rate limiting module using fixed, epoch-aligned windows.
//!
//! Each caller gets up to `max_requests` sends per window. The limiter
//! is handed to the dispatch engine, which consults it before doing any
//! other work; a refused request never creates a notification record.

mod limiter;
mod window;

use std::sync::Arc;

use crate::config::RateLimitConfig;

pub use limiter::{RateLimitDecision, RateLimiter, RateLimiterStats};
pub use window::FixedWindow;

/// Build the rate limiter from configuration.
///
/// Returns `None` when rate limiting is disabled; the engine then skips
/// the check entirely.
pub fn create_rate_limiter(settings: &RateLimitConfig) -> Option<Arc<RateLimiter>> {
    if !settings.enabled {
        tracing::info!("Rate limiting disabled");
        return None;
    }

    tracing::info!(
        max_requests = settings.max_requests,
        window_seconds = settings.window_seconds,
        "Rate limiting enabled"
    );
    Some(Arc::new(RateLimiter::new(
        settings.max_requests,
        settings.window_seconds,
    )))
}
