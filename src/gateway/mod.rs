//! Outbound delivery gateways.
//!
//! A gateway turns a rendered message into one provider call on one
//! channel (email or SMS). The HTTP backend posts to a provider's JSON
//! API with transport-level retries; the log backend records the send
//! and always succeeds, for development and tests. The factory wraps
//! whichever backend is configured in per-channel circuit breakers.

mod backoff;
mod circuit_breaker;
mod http;
mod log;
mod protected;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::GatewayConfig;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState,
};
pub use http::HttpDeliveryGateway;
pub use log::LogDeliveryGateway;
pub use protected::ProtectedGateway;

/// Delivery channels a recipient can be reached on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Email,
    Sms,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during an outbound delivery call.
///
/// Every variant is transient from the dispatch pipeline's point of
/// view: the attempt failed and the record stays retryable.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The provider answered and refused the message
    #[error("Provider rejected the message: {0}")]
    Rejected(String),

    /// Transport-level failure reaching the provider
    #[error("Transport error: {0}")]
    Transport(String),

    /// The call exceeded its deadline
    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),

    /// The channel's circuit breaker is open; the call was not made
    #[error("Circuit breaker open for {0} deliveries")]
    CircuitOpen(Channel),
}

/// Outbound delivery interface.
///
/// One `deliver` call is one delivery attempt on one channel, whatever
/// retrying the implementation does internally at the transport level.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Deliver a rendered message to one address over one channel.
    async fn deliver(
        &self,
        channel: Channel,
        address: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), GatewayError>;

    /// Backend type identifier for health reporting.
    fn backend_name(&self) -> &'static str;
}

/// Current time in milliseconds since epoch
pub(crate) fn current_time_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Create a delivery gateway based on configuration.
///
/// Returns the backend selected by the `backend` setting, wrapped in
/// per-channel circuit breakers:
/// - `"http"`: posts to the configured provider endpoints
/// - `"log"` (default): logs the message and succeeds
pub fn create_delivery_gateway(
    settings: &GatewayConfig,
) -> Result<Arc<ProtectedGateway>, GatewayError> {
    let inner: Arc<dyn DeliveryGateway> = match settings.backend.as_str() {
        "http" => {
            tracing::info!(
                backend = "http",
                email_endpoint = %settings.email_endpoint,
                sms_endpoint = %settings.sms_endpoint,
                "Creating HTTP delivery gateway"
            );
            Arc::new(HttpDeliveryGateway::new(settings)?)
        }
        _ => {
            tracing::info!(backend = "log", "Creating log delivery gateway");
            Arc::new(LogDeliveryGateway::new())
        }
    };

    let breaker_config = CircuitBreakerConfig {
        failure_threshold: settings.breaker_failure_threshold,
        success_threshold: settings.breaker_success_threshold,
        reset_timeout_ms: settings.breaker_reset_timeout_ms,
    };

    Ok(Arc::new(ProtectedGateway::new(inner, breaker_config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_as_str() {
        assert_eq!(Channel::Email.as_str(), "email");
        assert_eq!(Channel::Sms.as_str(), "sms");
        assert_eq!(format!("{}", Channel::Email), "email");
    }

    #[test]
    fn test_circuit_open_error_names_the_channel() {
        let err = GatewayError::CircuitOpen(Channel::Sms);
        assert_eq!(err.to_string(), "Circuit breaker open for sms deliveries");
    }
}
