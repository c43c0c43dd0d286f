//! Recipient directory lookups.
//!
//! Resolves a `user_id` into contact details (email, phone number,
//! preferred language) via the platform's user-management service.
//! Two backends are available: an HTTP client for the real service and
//! an in-memory table for development and tests. The factory wraps
//! whichever backend is configured in a TTL cache.

mod cache;
mod http;
mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::DirectoryConfig;

pub use cache::CachedDirectory;
pub use http::HttpDirectoryClient;
pub use memory::MemoryDirectoryClient;

/// Errors that can occur during a recipient lookup.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The directory answered authoritatively that the user does not exist
    #[error("User {0} not found in directory")]
    NotFound(Uuid),

    /// The lookup exceeded its deadline
    #[error("Directory lookup timed out after {0:?}")]
    Timeout(Duration),

    /// Transport-level failure reaching the directory
    #[error("Directory request failed: {0}")]
    Request(String),

    /// The directory answered with an unparseable payload
    #[error("Invalid directory response: {0}")]
    InvalidResponse(String),
}

impl DirectoryError {
    /// `NotFound` is the only authoritative (permanent) answer; every
    /// other variant may succeed on a later attempt.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DirectoryError::NotFound(_))
    }
}

/// Contact details for a notification recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    /// Email address, when the user has one on file
    pub email: Option<String>,

    /// Phone number for SMS, when on file
    pub phone_number: Option<String>,

    /// Preferred language code ("en", "am", "om")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_language: Option<String>,
}

impl Recipient {
    /// Whether at least one deliverable channel exists.
    pub fn has_contact(&self) -> bool {
        self.email.is_some() || self.phone_number.is_some()
    }
}

/// Directory lookup interface.
///
/// Implementations must be thread-safe (`Send + Sync`) as they are
/// shared across async tasks.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Resolve a user id to contact details.
    async fn lookup(&self, user_id: Uuid) -> Result<Recipient, DirectoryError>;

    /// Backend type identifier for health reporting.
    fn backend_name(&self) -> &'static str;
}

/// Create a directory client based on configuration.
///
/// Returns the backend selected by the `backend` setting, wrapped in a
/// TTL cache:
/// - `"http"`: calls the user-management service at `base_url`
/// - `"memory"` (default): an empty in-memory table, populated by tests
///   or local tooling
pub fn create_directory_client(
    settings: &DirectoryConfig,
) -> Result<Arc<CachedDirectory>, DirectoryError> {
    let cache_ttl = Duration::from_secs(settings.cache_ttl_seconds);

    let inner: Arc<dyn DirectoryClient> = match settings.backend.as_str() {
        "http" => {
            tracing::info!(
                backend = "http",
                base_url = %settings.base_url,
                timeout_seconds = settings.timeout_seconds,
                "Creating HTTP directory client"
            );
            Arc::new(HttpDirectoryClient::new(
                &settings.base_url,
                Duration::from_secs(settings.timeout_seconds),
            )?)
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory directory client");
            Arc::new(MemoryDirectoryClient::new())
        }
    };

    Ok(Arc::new(CachedDirectory::new(inner, cache_ttl)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipient_has_contact() {
        let both = Recipient {
            email: Some("a@example.com".to_string()),
            phone_number: Some("+251911000000".to_string()),
            preferred_language: None,
        };
        assert!(both.has_contact());

        let email_only = Recipient {
            email: Some("a@example.com".to_string()),
            phone_number: None,
            preferred_language: None,
        };
        assert!(email_only.has_contact());

        let neither = Recipient {
            email: None,
            phone_number: None,
            preferred_language: Some("am".to_string()),
        };
        assert!(!neither.has_contact());
    }

    #[test]
    fn test_not_found_is_the_only_permanent_error() {
        assert!(DirectoryError::NotFound(Uuid::new_v4()).is_not_found());
        assert!(!DirectoryError::Timeout(Duration::from_secs(5)).is_not_found());
        assert!(!DirectoryError::Request("boom".to_string()).is_not_found());
        assert!(!DirectoryError::InvalidResponse("bad json".to_string()).is_not_found());
    }
}
