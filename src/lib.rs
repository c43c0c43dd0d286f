// Domain layer (business logic)
pub mod directory;
pub mod dispatch;
pub mod gateway;
pub mod notification;
pub mod ratelimit;
pub mod store;
pub mod template;

// Application layer
pub mod api;
pub mod server;

// Supporting modules
pub mod config;
pub mod error;
pub mod metrics;
pub mod tasks;
pub mod telemetry;
