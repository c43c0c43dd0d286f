//! Logging delivery backend for development and tests.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use super::{Channel, DeliveryGateway, GatewayError};

/// Gateway that records deliveries in the log and always succeeds.
///
/// Stands in for the real providers in local development; the delivered
/// count is exposed so smoke tests can assert traffic went through.
pub struct LogDeliveryGateway {
    delivered: AtomicU64,
}

impl LogDeliveryGateway {
    pub fn new() -> Self {
        Self {
            delivered: AtomicU64::new(0),
        }
    }

    /// Number of messages accepted since startup.
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

impl Default for LogDeliveryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryGateway for LogDeliveryGateway {
    async fn deliver(
        &self,
        channel: Channel,
        address: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), GatewayError> {
        self.delivered.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            channel = %channel,
            to = %address,
            subject = %subject,
            "Delivery accepted (log gateway)"
        );
        tracing::debug!(body = %body, "Log gateway message body");

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_always_succeeds_and_counts() {
        let gateway = LogDeliveryGateway::new();

        gateway
            .deliver(Channel::Email, "tenant@example.com", "Subject", "Body")
            .await
            .unwrap();
        gateway
            .deliver(Channel::Sms, "+251911000000", "Subject", "Body")
            .await
            .unwrap();

        assert_eq!(gateway.delivered_count(), 2);
    }
}
