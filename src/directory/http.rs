//! HTTP directory backend for the user-management service.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::{DirectoryClient, DirectoryError, Recipient};

/// Directory client backed by the user-management service's REST API.
///
/// Looks up `GET {base_url}/users/{user_id}` and expects a JSON body
/// with `email`, `phone_number` and `preferred_language` fields. A 404
/// maps to [`DirectoryError::NotFound`]; everything else non-2xx is a
/// transport failure.
pub struct HttpDirectoryClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpDirectoryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DirectoryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DirectoryError::Request(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl DirectoryClient for HttpDirectoryClient {
    async fn lookup(&self, user_id: Uuid) -> Result<Recipient, DirectoryError> {
        let url = format!("{}/users/{}", self.base_url, user_id);

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                DirectoryError::Timeout(self.timeout)
            } else {
                DirectoryError::Request(e.to_string())
            }
        })?;

        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Err(DirectoryError::NotFound(user_id)),
            status if status.is_success() => response
                .json::<Recipient>()
                .await
                .map_err(|e| DirectoryError::InvalidResponse(e.to_string())),
            status => Err(DirectoryError::Request(format!(
                "directory returned {} for user {}",
                status, user_id
            ))),
        }
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client =
            HttpDirectoryClient::new("http://users.internal/api/v1/", Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.base_url, "http://users.internal/api/v1");
    }

    #[test]
    fn test_backend_name() {
        let client =
            HttpDirectoryClient::new("http://users.internal", Duration::from_secs(5)).unwrap();
        assert_eq!(client.backend_name(), "http");
    }
}
