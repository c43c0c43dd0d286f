//! PostgreSQL notification store.
//!
//! One row per notification with a JSONB context column. The schema is
//! bootstrapped on connect so a fresh database works without a manual
//! migration step. The conditional attempt update is a single
//! `UPDATE .. WHERE id = $1 AND attempts = $2`, so concurrent writers
//! serialize on the row without an advisory lock.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::notification::{EventType, Notification, NotificationStatus};

use super::{
    AggregateStats, AttemptRecord, NotificationFilter, NotificationStore, StatusCounts, StoreError,
};

const SELECT_COLUMNS: &str =
    "id, user_id, event_type, status, attempts, context, sent_at, created_at, updated_at";

type NotificationRow = (
    Uuid,
    Uuid,
    String,
    String,
    i32,
    serde_json::Value,
    Option<DateTime<Utc>>,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn row_to_notification(row: NotificationRow) -> Result<Notification, StoreError> {
    let (id, user_id, event_type, status, attempts, context, sent_at, created_at, updated_at) = row;
    let event_type: EventType = serde_json::from_value(serde_json::Value::String(event_type))?;
    let status: NotificationStatus = serde_json::from_value(serde_json::Value::String(status))?;
    Ok(Notification {
        id,
        user_id,
        event_type,
        status,
        attempts: attempts.max(0) as u32,
        context,
        sent_at,
        created_at,
        updated_at,
    })
}

/// Store backed by a PostgreSQL `notifications` table.
pub struct PostgresNotificationStore {
    pool: PgPool,
}

impl PostgresNotificationStore {
    /// Connect a pool from configuration and bootstrap the schema.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await?;

        tracing::info!(
            pool_size = config.pool_size,
            "Connected to PostgreSQL notification store"
        );

        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Wrap an existing pool without touching the schema.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notifications (
                id UUID PRIMARY KEY,
                user_id UUID NOT NULL,
                event_type TEXT NOT NULL,
                status TEXT NOT NULL,
                attempts INT NOT NULL DEFAULT 0,
                context JSONB NOT NULL,
                sent_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Partial index keeps the sweep query cheap as the table grows
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_notifications_retrying \
             ON notifications (updated_at) WHERE status = 'RETRYING'",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_notifications_user \
             ON notifications (user_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        tracing::debug!("Notification schema ensured");
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for PostgresNotificationStore {
    async fn create(&self, notification: &Notification) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO notifications
                (id, user_id, event_type, status, attempts, context, sent_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(notification.event_type.as_str())
        .bind(notification.status.as_str())
        .bind(notification.attempts as i32)
        .bind(&notification.context)
        .bind(notification.sent_at)
        .bind(notification.created_at)
        .bind(notification.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                StoreError::Duplicate(notification.id)
            }
            _ => StoreError::Postgres(err),
        })?;

        tracing::trace!(id = %notification.id, "Stored notification");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Notification>, StoreError> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM notifications WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_notification).transpose()
    }

    async fn list(&self, filter: &NotificationFilter) -> Result<Vec<Notification>, StoreError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SELECT_COLUMNS} FROM notifications
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR event_type = $2)
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(filter.user_id)
        .bind(filter.event_type.map(|e| e.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_notification).collect()
    }

    async fn list_retry_eligible(
        &self,
        max_attempts: u32,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SELECT_COLUMNS} FROM notifications
            WHERE status = 'RETRYING' AND attempts < $1
            ORDER BY updated_at ASC
            LIMIT $2
            "#
        ))
        .bind(max_attempts as i32)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        tracing::trace!(count = rows.len(), "Fetched retry-eligible notifications");
        rows.into_iter().map(row_to_notification).collect()
    }

    async fn record_attempt(
        &self,
        id: Uuid,
        expected_attempts: u32,
        outcome: &AttemptRecord,
    ) -> Result<Notification, StoreError> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            r#"
            UPDATE notifications
            SET status = $3, attempts = $4, sent_at = $5, updated_at = NOW()
            WHERE id = $1 AND attempts = $2
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(expected_attempts as i32)
        .bind(outcome.status.as_str())
        .bind(outcome.attempts as i32)
        .bind(outcome.sent_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_notification(row),
            None => {
                // Missed update: tell a missing record apart from a lost race
                let exists: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE id = $1")
                        .bind(id)
                        .fetch_one(&self.pool)
                        .await?;
                if exists > 0 {
                    Err(StoreError::Conflict {
                        id,
                        expected: expected_attempts,
                    })
                } else {
                    Err(StoreError::NotFound(id))
                }
            }
        }
    }

    async fn aggregate_stats(&self) -> Result<AggregateStats, StoreError> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            "SELECT event_type, status, COUNT(*) FROM notifications GROUP BY event_type, status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_status = StatusCounts::default();
        let mut by_event_type = std::collections::BTreeMap::new();
        for (event_type, status, count) in rows {
            let status: NotificationStatus =
                serde_json::from_value(serde_json::Value::String(status))?;
            let count = count.max(0) as u64;
            by_status.add(status, count);
            by_event_type
                .entry(event_type)
                .or_insert_with(StatusCounts::default)
                .add(status, count);
        }

        Ok(AggregateStats {
            total: by_status.total(),
            by_status,
            by_event_type,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_row() -> NotificationRow {
        (
            Uuid::new_v4(),
            Uuid::new_v4(),
            "payment_success".to_string(),
            "RETRYING".to_string(),
            2,
            json!({"property_title": "Bole Apartment", "location": "Addis Ababa", "amount": 4500}),
            None,
            Utc::now(),
            Utc::now(),
        )
    }

    #[test]
    fn test_row_mapping() {
        let row = sample_row();
        let id = row.0;
        let record = row_to_notification(row).unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.event_type, EventType::PaymentSuccess);
        assert_eq!(record.status, NotificationStatus::Retrying);
        assert_eq!(record.attempts, 2);
        assert!(record.sent_at.is_none());
    }

    #[test]
    fn test_row_mapping_rejects_unknown_status() {
        let mut row = sample_row();
        row.3 = "SNOOZED".to_string();
        assert!(matches!(
            row_to_notification(row),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_row_mapping_rejects_unknown_event_type() {
        let mut row = sample_row();
        row.2 = "lease_renewal".to_string();
        assert!(matches!(
            row_to_notification(row),
            Err(StoreError::Serialization(_))
        ));
    }
}
