//! In-memory notification store.
//!
//! Backed by a DashMap with a monotonic insertion sequence so listings
//! come back in creation order. Suitable for development and tests;
//! records are lost on restart.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::notification::{Notification, NotificationStatus};

use super::{
    AggregateStats, AttemptRecord, NotificationFilter, NotificationStore, StatusCounts, StoreError,
};

struct StoredRecord {
    /// Insertion order, for stable listings
    seq: u64,
    record: Notification,
}

/// In-process store shared behind an `Arc`.
pub struct MemoryNotificationStore {
    records: DashMap<Uuid, StoredRecord>,
    next_seq: AtomicU64,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for MemoryNotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn create(&self, notification: &Notification) -> Result<(), StoreError> {
        use dashmap::mapref::entry::Entry;

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        match self.records.entry(notification.id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(notification.id)),
            Entry::Vacant(slot) => {
                slot.insert(StoredRecord {
                    seq,
                    record: notification.clone(),
                });
                tracing::trace!(id = %notification.id, "Stored notification");
                Ok(())
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Notification>, StoreError> {
        Ok(self.records.get(&id).map(|entry| entry.record.clone()))
    }

    async fn list(&self, filter: &NotificationFilter) -> Result<Vec<Notification>, StoreError> {
        let mut rows: Vec<(u64, Notification)> = self
            .records
            .iter()
            .filter(|entry| filter.matches(&entry.record))
            .map(|entry| (entry.seq, entry.record.clone()))
            .collect();
        rows.sort_by_key(|(seq, _)| *seq);
        Ok(rows.into_iter().map(|(_, record)| record).collect())
    }

    async fn list_retry_eligible(
        &self,
        max_attempts: u32,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError> {
        let mut rows: Vec<Notification> = self
            .records
            .iter()
            .filter(|entry| {
                entry.record.status == NotificationStatus::Retrying
                    && entry.record.attempts < max_attempts
            })
            .map(|entry| entry.record.clone())
            .collect();
        // Oldest update first so starved records get swept eventually
        rows.sort_by_key(|record| record.updated_at);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn record_attempt(
        &self,
        id: Uuid,
        expected_attempts: u32,
        outcome: &AttemptRecord,
    ) -> Result<Notification, StoreError> {
        let mut entry = self.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if entry.record.attempts != expected_attempts {
            return Err(StoreError::Conflict {
                id,
                expected: expected_attempts,
            });
        }

        entry.record.status = outcome.status;
        entry.record.attempts = outcome.attempts;
        entry.record.sent_at = Some(outcome.sent_at);
        entry.record.updated_at = Utc::now();
        Ok(entry.record.clone())
    }

    async fn aggregate_stats(&self) -> Result<AggregateStats, StoreError> {
        let mut by_status = StatusCounts::default();
        let mut by_event_type = std::collections::BTreeMap::new();

        for entry in self.records.iter() {
            by_status.record(entry.record.status);
            by_event_type
                .entry(entry.record.event_type.as_str().to_string())
                .or_insert_with(StatusCounts::default)
                .record(entry.record.status);
        }

        Ok(AggregateStats {
            total: by_status.total(),
            by_status,
            by_event_type,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::EventType;
    use serde_json::json;

    fn sample(event_type: EventType) -> Notification {
        Notification::new(Uuid::new_v4(), event_type, json!({"property_title": "Bole Apartment"}))
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = MemoryNotificationStore::new();
        let record = sample(EventType::PaymentSuccess);

        store.create(&record).await.unwrap();
        let fetched = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, record.id);
        assert_eq!(fetched.status, NotificationStatus::Pending);
        assert_eq!(fetched.attempts, 0);

        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let store = MemoryNotificationStore::new();
        let record = sample(EventType::PaymentSuccess);

        store.create(&record).await.unwrap();
        let err = store.create(&record).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(id) if id == record.id));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_list_in_creation_order_with_filters() {
        let store = MemoryNotificationStore::new();
        let first = sample(EventType::PaymentSuccess);
        let second = sample(EventType::ListingApproved);
        let third = sample(EventType::PaymentSuccess);

        store.create(&first).await.unwrap();
        store.create(&second).await.unwrap();
        store.create(&third).await.unwrap();

        let all = store.list(&NotificationFilter::default()).await.unwrap();
        let ids: Vec<Uuid> = all.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![first.id, second.id, third.id]);

        let payments = store
            .list(&NotificationFilter {
                user_id: None,
                event_type: Some(EventType::PaymentSuccess),
            })
            .await
            .unwrap();
        assert_eq!(payments.len(), 2);

        let by_user = store
            .list(&NotificationFilter {
                user_id: Some(second.user_id),
                event_type: None,
            })
            .await
            .unwrap();
        assert_eq!(by_user.len(), 1);
        assert_eq!(by_user[0].id, second.id);
    }

    #[tokio::test]
    async fn test_retry_eligibility_predicate() {
        let store = MemoryNotificationStore::new();

        let mut retrying = sample(EventType::PaymentFailed);
        retrying.status = NotificationStatus::Retrying;
        retrying.attempts = 1;

        let mut exhausted = sample(EventType::PaymentFailed);
        exhausted.status = NotificationStatus::Retrying;
        exhausted.attempts = 3;

        let mut sent = sample(EventType::PaymentFailed);
        sent.status = NotificationStatus::Sent;
        sent.attempts = 1;

        let mut failed = sample(EventType::PaymentFailed);
        failed.status = NotificationStatus::Failed;
        failed.attempts = 2;

        for record in [&retrying, &exhausted, &sent, &failed] {
            store.create(record).await.unwrap();
        }

        let eligible = store.list_retry_eligible(3, 10).await.unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, retrying.id);
    }

    #[tokio::test]
    async fn test_retry_listing_ordered_and_capped() {
        let store = MemoryNotificationStore::new();
        let mut ids = Vec::new();
        for _ in 0..5 {
            let mut record = sample(EventType::TenantUpdate);
            record.status = NotificationStatus::Retrying;
            record.attempts = 1;
            record.updated_at = Utc::now();
            ids.push(record.id);
            store.create(&record).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let eligible = store.list_retry_eligible(3, 3).await.unwrap();
        assert_eq!(eligible.len(), 3);
        // Oldest updates surface first
        assert_eq!(eligible[0].id, ids[0]);
        assert_eq!(eligible[1].id, ids[1]);
        assert_eq!(eligible[2].id, ids[2]);
    }

    #[tokio::test]
    async fn test_record_attempt_applies_outcome() {
        let store = MemoryNotificationStore::new();
        let record = sample(EventType::PaymentSuccess);
        store.create(&record).await.unwrap();

        let updated = store
            .record_attempt(
                record.id,
                0,
                &AttemptRecord {
                    status: NotificationStatus::Sent,
                    attempts: 1,
                    sent_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, NotificationStatus::Sent);
        assert_eq!(updated.attempts, 1);
        assert!(updated.sent_at.is_some());
        assert!(updated.updated_at >= record.updated_at);
    }

    #[tokio::test]
    async fn test_record_attempt_detects_lost_race() {
        let store = MemoryNotificationStore::new();
        let record = sample(EventType::PaymentSuccess);
        store.create(&record).await.unwrap();

        store
            .record_attempt(
                record.id,
                0,
                &AttemptRecord {
                    status: NotificationStatus::Retrying,
                    attempts: 1,
                    sent_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        // A second writer that also observed attempts=0 must lose
        let err = store
            .record_attempt(
                record.id,
                0,
                &AttemptRecord {
                    status: NotificationStatus::Sent,
                    attempts: 1,
                    sent_at: Utc::now(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { expected: 0, .. }));

        let stored = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, NotificationStatus::Retrying);
    }

    #[tokio::test]
    async fn test_record_attempt_unknown_id() {
        let store = MemoryNotificationStore::new();
        let err = store
            .record_attempt(
                Uuid::new_v4(),
                0,
                &AttemptRecord {
                    status: NotificationStatus::Sent,
                    attempts: 1,
                    sent_at: Utc::now(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_aggregate_stats() {
        let store = MemoryNotificationStore::new();

        let mut sent = sample(EventType::PaymentSuccess);
        sent.status = NotificationStatus::Sent;
        let mut failed = sample(EventType::PaymentSuccess);
        failed.status = NotificationStatus::Failed;
        let pending = sample(EventType::ListingApproved);

        for record in [&sent, &failed, &pending] {
            store.create(record).await.unwrap();
        }

        let stats = store.aggregate_stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_status.sent, 1);
        assert_eq!(stats.by_status.failed, 1);
        assert_eq!(stats.by_status.pending, 1);
        assert_eq!(stats.by_event_type["payment_success"].total(), 2);
        assert_eq!(stats.by_event_type["listing_approved"].pending, 1);
    }
}
