//! Notification persistence.
//!
//! The store is the sole writer of notification records: the dispatch
//! engine and the retry sweeper request every state change through it.
//! `record_attempt` is a conditional update keyed on the previously
//! observed attempt count, so two racing writers can never both count
//! the same attempt. Backends: in-memory DashMap (default) and
//! PostgreSQL, selected by configuration.

mod memory;
mod postgres;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{DatabaseConfig, StoreConfig};
use crate::notification::{EventType, Notification, NotificationStatus};

pub use memory::MemoryNotificationStore;
pub use postgres::PostgresNotificationStore;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record with this id exists
    #[error("Notification {0} not found")]
    NotFound(Uuid),

    /// A record with this id already exists
    #[error("Notification {0} already exists")]
    Duplicate(Uuid),

    /// A conditional update lost the race: the stored attempt count no
    /// longer matches what the writer observed
    #[error("Stale update for notification {id}: expected {expected} attempts")]
    Conflict { id: Uuid, expected: u32 },

    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether this error is the lost-race outcome of a conditional
    /// update rather than a backend fault.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Filter for listing notifications.
///
/// Empty filters match everything; results are always in creation order.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationFilter {
    pub user_id: Option<Uuid>,
    pub event_type: Option<EventType>,
}

impl NotificationFilter {
    pub fn matches(&self, notification: &Notification) -> bool {
        self.user_id.is_none_or(|u| notification.user_id == u)
            && self.event_type.is_none_or(|e| notification.event_type == e)
    }
}

/// Outcome of one completed delivery attempt, applied atomically by
/// [`NotificationStore::record_attempt`].
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    /// State the record lands in (`SENT`, `RETRYING` or `FAILED`)
    pub status: NotificationStatus,
    /// New completed-attempt count
    pub attempts: u32,
    /// When the attempt completed
    pub sent_at: DateTime<Utc>,
}

/// Counts per lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub retrying: u64,
    pub sent: u64,
    pub failed: u64,
}

impl StatusCounts {
    pub fn add(&mut self, status: NotificationStatus, count: u64) {
        match status {
            NotificationStatus::Pending => self.pending += count,
            NotificationStatus::Retrying => self.retrying += count,
            NotificationStatus::Sent => self.sent += count,
            NotificationStatus::Failed => self.failed += count,
        }
    }

    pub fn record(&mut self, status: NotificationStatus) {
        self.add(status, 1);
    }

    pub fn total(&self) -> u64 {
        self.pending + self.retrying + self.sent + self.failed
    }
}

/// Aggregate statistics over all stored notifications.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateStats {
    /// Total records
    pub total: u64,
    /// Counts per status
    pub by_status: StatusCounts,
    /// Per-event-type breakdown of status counts
    pub by_event_type: BTreeMap<String, StatusCounts>,
}

/// Notification persistence interface.
///
/// Implementations must be thread-safe (`Send + Sync`); they are shared
/// between the HTTP handlers, the dispatch engine and the sweeper.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert a fresh record. Fails with [`StoreError::Duplicate`] if
    /// the id is already present.
    async fn create(&self, notification: &Notification) -> Result<(), StoreError>;

    /// Fetch one record by id.
    async fn get(&self, id: Uuid) -> Result<Option<Notification>, StoreError>;

    /// List records matching the filter, in creation order.
    async fn list(&self, filter: &NotificationFilter) -> Result<Vec<Notification>, StoreError>;

    /// List records eligible for a retry sweep, oldest update first,
    /// capped at `limit`.
    ///
    /// This is the one home of the eligibility predicate:
    /// `status = RETRYING AND attempts < max_attempts`.
    async fn list_retry_eligible(
        &self,
        max_attempts: u32,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError>;

    /// Apply the outcome of a completed delivery attempt.
    ///
    /// The update only lands if the stored attempt count still equals
    /// `expected_attempts`; otherwise [`StoreError::Conflict`] is
    /// returned and nothing changes. `updated_at` is stamped by the
    /// store.
    async fn record_attempt(
        &self,
        id: Uuid,
        expected_attempts: u32,
        outcome: &AttemptRecord,
    ) -> Result<Notification, StoreError>;

    /// Aggregate counts across all records.
    async fn aggregate_stats(&self) -> Result<AggregateStats, StoreError>;

    /// Cheap backend liveness check for the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Backend type identifier for health reporting.
    fn backend_name(&self) -> &'static str;
}

/// Create a notification store based on configuration.
///
/// Returns the backend selected by the `backend` setting:
/// - `"postgres"`: connects to `database.url` and bootstraps the schema
/// - `"memory"` (default): an in-process store, lost on restart
pub async fn create_notification_store(
    settings: &StoreConfig,
    database: &DatabaseConfig,
) -> Result<Arc<dyn NotificationStore>, StoreError> {
    match settings.backend.as_str() {
        "postgres" => {
            tracing::info!(
                backend = "postgres",
                pool_size = database.pool_size,
                "Creating PostgreSQL notification store"
            );
            let store = PostgresNotificationStore::connect(database).await?;
            Ok(Arc::new(store))
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory notification store");
            Ok(Arc::new(MemoryNotificationStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_matches() {
        let record = Notification::new(
            Uuid::new_v4(),
            EventType::PaymentSuccess,
            json!({"amount": 1}),
        );

        assert!(NotificationFilter::default().matches(&record));
        assert!(NotificationFilter {
            user_id: Some(record.user_id),
            event_type: Some(EventType::PaymentSuccess),
        }
        .matches(&record));
        assert!(!NotificationFilter {
            user_id: Some(Uuid::new_v4()),
            event_type: None,
        }
        .matches(&record));
        assert!(!NotificationFilter {
            user_id: None,
            event_type: Some(EventType::TenantUpdate),
        }
        .matches(&record));
    }

    #[test]
    fn test_status_counts_totals() {
        let mut counts = StatusCounts::default();
        counts.record(NotificationStatus::Sent);
        counts.record(NotificationStatus::Sent);
        counts.record(NotificationStatus::Failed);
        counts.add(NotificationStatus::Retrying, 3);

        assert_eq!(counts.sent, 2);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.retrying, 3);
        assert_eq!(counts.total(), 6);
    }

    #[test]
    fn test_conflict_recognition() {
        let conflict = StoreError::Conflict {
            id: Uuid::new_v4(),
            expected: 1,
        };
        assert!(conflict.is_conflict());
        assert!(!StoreError::NotFound(Uuid::new_v4()).is_conflict());
    }
}
