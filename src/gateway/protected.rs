//! Circuit-breaker protection for delivery gateways.

use std::sync::Arc;

use async_trait::async_trait;

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats};
use super::{Channel, DeliveryGateway, GatewayError};

/// Decorator that guards a gateway with one circuit breaker per channel.
///
/// While a channel's circuit is open, deliveries on that channel fail
/// fast with [`GatewayError::CircuitOpen`] without touching the
/// provider. The other channel is unaffected.
pub struct ProtectedGateway {
    inner: Arc<dyn DeliveryGateway>,
    email_breaker: CircuitBreaker,
    sms_breaker: CircuitBreaker,
}

impl ProtectedGateway {
    pub fn new(inner: Arc<dyn DeliveryGateway>, config: CircuitBreakerConfig) -> Self {
        Self {
            inner,
            email_breaker: CircuitBreaker::with_config(config.clone()),
            sms_breaker: CircuitBreaker::with_config(config),
        }
    }

    fn breaker(&self, channel: Channel) -> &CircuitBreaker {
        match channel {
            Channel::Email => &self.email_breaker,
            Channel::Sms => &self.sms_breaker,
        }
    }

    /// Breaker statistics for one channel, for health and stats output.
    pub fn breaker_stats(&self, channel: Channel) -> CircuitBreakerStats {
        self.breaker(channel).stats()
    }
}

#[async_trait]
impl DeliveryGateway for ProtectedGateway {
    async fn deliver(
        &self,
        channel: Channel,
        address: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), GatewayError> {
        let breaker = self.breaker(channel);

        if !breaker.allow_request() {
            return Err(GatewayError::CircuitOpen(channel));
        }

        match self.inner.deliver(channel, address, subject, body).await {
            Ok(()) => {
                breaker.record_success();
                Ok(())
            }
            Err(err) => {
                // A rejection is an answered request; only transport-level
                // failures trip the breaker
                match &err {
                    GatewayError::Rejected(_) => breaker.record_success(),
                    _ => breaker.record_failure(),
                }
                Err(err)
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}
