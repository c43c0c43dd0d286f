//! HTTP delivery backend posting to provider JSON APIs.
//!
//! Speaks a generic `{from, to, subject, body}` JSON shape against one
//! endpoint per channel. Transport failures (connect errors, timeouts,
//! 5xx) are retried with exponential backoff up to `transport_tries`;
//! a 4xx is a provider rejection and returns immediately.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::GatewayConfig;

use super::backoff::{BackoffConfig, ExponentialBackoff};
use super::{Channel, DeliveryGateway, GatewayError};

#[derive(Debug, Serialize)]
struct DeliveryPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Delivery gateway backed by HTTP provider endpoints.
pub struct HttpDeliveryGateway {
    client: reqwest::Client,
    email_endpoint: String,
    sms_endpoint: String,
    sender: String,
    api_key: Option<String>,
    timeout: Duration,
    transport_tries: u32,
    backoff: BackoffConfig,
}

impl HttpDeliveryGateway {
    pub fn new(settings: &GatewayConfig) -> Result<Self, GatewayError> {
        let timeout = Duration::from_secs(settings.timeout_seconds);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            email_endpoint: settings.email_endpoint.clone(),
            sms_endpoint: settings.sms_endpoint.clone(),
            sender: settings.sender.clone(),
            api_key: settings.api_key.clone(),
            timeout,
            transport_tries: settings.transport_tries.max(1),
            backoff: BackoffConfig {
                initial_delay_ms: settings.transport_initial_delay_ms,
                max_delay_ms: settings.transport_max_delay_ms,
                ..BackoffConfig::default()
            },
        })
    }

    fn endpoint(&self, channel: Channel) -> &str {
        match channel {
            Channel::Email => &self.email_endpoint,
            Channel::Sms => &self.sms_endpoint,
        }
    }

    async fn post_once(
        &self,
        endpoint: &str,
        payload: &DeliveryPayload<'_>,
    ) -> Result<(), GatewayError> {
        let mut request = self.client.post(endpoint).json(payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout(self.timeout)
            } else {
                GatewayError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            Err(GatewayError::Rejected(format!("{}: {}", status, detail)))
        } else {
            Err(GatewayError::Transport(format!("{}: {}", status, detail)))
        }
    }
}

#[async_trait]
impl DeliveryGateway for HttpDeliveryGateway {
    async fn deliver(
        &self,
        channel: Channel,
        address: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), GatewayError> {
        let endpoint = self.endpoint(channel);
        let payload = DeliveryPayload {
            from: &self.sender,
            to: address,
            subject,
            body,
        };

        let mut backoff = ExponentialBackoff::with_config(self.backoff.clone());
        let mut transport_attempt = 0;

        loop {
            transport_attempt += 1;

            match self.post_once(endpoint, &payload).await {
                Ok(()) => {
                    tracing::debug!(
                        channel = %channel,
                        transport_attempts = transport_attempt,
                        "Provider accepted message"
                    );
                    return Ok(());
                }
                // A rejection is an answered request; retrying the same
                // payload will not change the answer
                Err(err @ GatewayError::Rejected(_)) => return Err(err),
                Err(err) if transport_attempt >= self.transport_tries => return Err(err),
                Err(err) => {
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        channel = %channel,
                        transport_attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Provider call failed, retrying transport"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> GatewayConfig {
        GatewayConfig {
            backend: "http".to_string(),
            email_endpoint: "http://mail.internal/v1/send".to_string(),
            sms_endpoint: "http://sms.internal/v1/send".to_string(),
            sender: "no-reply@gojo-rentals.com".to_string(),
            api_key: None,
            timeout_seconds: 10,
            transport_tries: 0,
            transport_initial_delay_ms: 500,
            transport_max_delay_ms: 5_000,
            breaker_failure_threshold: 5,
            breaker_success_threshold: 2,
            breaker_reset_timeout_ms: 30_000,
        }
    }

    #[test]
    fn test_endpoint_per_channel() {
        let gateway = HttpDeliveryGateway::new(&settings()).unwrap();
        assert_eq!(gateway.endpoint(Channel::Email), "http://mail.internal/v1/send");
        assert_eq!(gateway.endpoint(Channel::Sms), "http://sms.internal/v1/send");
    }

    #[test]
    fn test_zero_tries_is_clamped_to_one() {
        let gateway = HttpDeliveryGateway::new(&settings()).unwrap();
        assert_eq!(gateway.transport_tries, 1);
    }

    #[test]
    fn test_payload_shape() {
        let payload = DeliveryPayload {
            from: "no-reply@gojo-rentals.com",
            to: "tenant@example.com",
            subject: "Payment Successful",
            body: "...",
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["from"], "no-reply@gojo-rentals.com");
        assert_eq!(json["to"], "tenant@example.com");
    }
}
