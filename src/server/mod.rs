//! HTTP server assembly: shared state, router construction and
//! request middleware.

mod app;
mod middleware;
mod state;

pub use app::create_app;
pub use middleware::{api_key_auth, caller_key, rate_limited_response, track_metrics};
pub use state::AppState;
