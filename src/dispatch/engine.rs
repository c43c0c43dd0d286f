use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::directory::{DirectoryClient, Recipient};
use crate::gateway::{Channel, DeliveryGateway};
use crate::metrics::{DeliveryMetrics, NotificationMetrics};
use crate::notification::{EventType, Notification, NotificationStatus};
use crate::ratelimit::{RateLimitDecision, RateLimiter};
use crate::store::{AttemptRecord, NotificationStore, StoreError};
use crate::template::{self, Language, RenderedMessage};

/// Errors surfaced to callers of the engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Request rejected before any record was created
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Store operation failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Inbound send request
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub user_id: Uuid,
    pub event_type: String,
    pub context: serde_json::Value,
}

/// What a submission came to
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// A record was created and one delivery attempt ran; its status
    /// tells whether it went out (`SENT`), is queued for the sweeper
    /// (`RETRYING`) or failed for good (`FAILED`)
    Completed {
        notification: Notification,
        reason: Option<String>,
    },
    /// Refused by the rate limiter; no record was created
    Rejected {
        retry_after: u64,
        limit: u32,
        reset_at: i64,
    },
}

/// How one delivery attempt resolved
enum AttemptResolution {
    Delivered,
    /// Will never succeed; retrying is pointless
    Permanent(String),
    /// Worth another try
    Transient(String),
}

/// Statistics for the dispatch engine
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Requests that created a record
    pub submitted: AtomicU64,
    /// Requests refused by the rate limiter
    pub rejected: AtomicU64,
    /// Attempts that delivered
    pub delivered: AtomicU64,
    /// Attempts that left the record queued for retry
    pub retrying: AtomicU64,
    /// Attempts that failed the record permanently
    pub failed: AtomicU64,
}

impl EngineStats {
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            retrying: self.retrying.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of engine statistics
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatsSnapshot {
    pub submitted: u64,
    pub rejected: u64,
    pub delivered: u64,
    pub retrying: u64,
    pub failed: u64,
}

/// Runs the send pipeline: rate limit, validate, persist, look up the
/// recipient, render the templates, deliver, persist the outcome.
///
/// The engine owns no background machinery. Retries happen only when
/// something calls [`RetrySweeper::sweep_once`], which feeds eligible
/// records back through [`DispatchEngine::retry`].
///
/// [`RetrySweeper::sweep_once`]: super::RetrySweeper::sweep_once
pub struct DispatchEngine {
    store: Arc<dyn NotificationStore>,
    directory: Arc<dyn DirectoryClient>,
    gateway: Arc<dyn DeliveryGateway>,
    rate_limiter: Option<Arc<RateLimiter>>,
    config: DispatchConfig,
    stats: EngineStats,
}

impl DispatchEngine {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        directory: Arc<dyn DirectoryClient>,
        gateway: Arc<dyn DeliveryGateway>,
        rate_limiter: Option<Arc<RateLimiter>>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            directory,
            gateway,
            rate_limiter,
            config,
            stats: EngineStats::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn NotificationStore> {
        &self.store
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn rate_limiter(&self) -> Option<&Arc<RateLimiter>> {
        self.rate_limiter.as_ref()
    }

    /// Get engine statistics
    pub fn stats(&self) -> EngineStatsSnapshot {
        self.stats.snapshot()
    }

    /// Take a send request through the whole pipeline.
    ///
    /// `caller` identifies the client for rate limiting. A rejected
    /// request leaves no record behind; an accepted one always does,
    /// whatever its first attempt comes to.
    #[tracing::instrument(
        name = "engine.submit",
        skip(self, request),
        fields(user_id = %request.user_id, event_type = %request.event_type)
    )]
    pub async fn submit(
        &self,
        caller: &str,
        request: SubmitRequest,
    ) -> Result<SubmitOutcome, EngineError> {
        // The rate limiter runs before anything else so a refused
        // request costs nothing and leaves no trace
        if let Some(limiter) = &self.rate_limiter {
            if let RateLimitDecision::Denied {
                retry_after,
                limit,
                reset_at,
            } = limiter.check(caller)
            {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                return Ok(SubmitOutcome::Rejected {
                    retry_after,
                    limit,
                    reset_at,
                });
            }
        }

        let event_type: EventType = request
            .event_type
            .parse()
            .map_err(|err: crate::notification::UnknownEventType| {
                EngineError::Validation(err.to_string())
            })?;
        if !request.context.is_object() {
            return Err(EngineError::Validation(
                "context must be a JSON object".to_string(),
            ));
        }

        let notification = Notification::new(request.user_id, event_type, request.context);
        self.store.create(&notification).await?;
        NotificationMetrics::record_created();
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(notification_id = %notification.id, "Notification accepted");

        let resolution = self.run_attempt(&notification).await;
        let (updated, reason) = self.persist_outcome(&notification, resolution).await?;

        Ok(SubmitOutcome::Completed {
            notification: updated,
            reason,
        })
    }

    /// Re-run delivery for a record the sweeper picked up.
    ///
    /// The conditional update in the store guarantees that a record
    /// which moved on since it was listed is left alone.
    #[tracing::instrument(
        name = "engine.retry",
        skip(self, notification),
        fields(
            notification_id = %notification.id,
            attempt = notification.attempts + 1
        )
    )]
    pub async fn retry(&self, notification: &Notification) -> Result<Notification, EngineError> {
        let resolution = self.run_attempt(notification).await;
        let (updated, _) = self.persist_outcome(notification, resolution).await?;
        Ok(updated)
    }

    async fn run_attempt(&self, notification: &Notification) -> AttemptResolution {
        let started = Instant::now();
        let resolution = self.attempt_delivery(notification).await;
        DeliveryMetrics::observe_duration(started.elapsed().as_secs_f64());
        resolution
    }

    /// One end-to-end delivery attempt: recipient lookup, render, send.
    async fn attempt_delivery(&self, notification: &Notification) -> AttemptResolution {
        let call_timeout = Duration::from_secs(self.config.call_timeout_seconds);

        let lookup = tokio::time::timeout(call_timeout, self.directory.lookup(notification.user_id));
        let recipient = match lookup.await {
            Ok(Ok(recipient)) => recipient,
            Ok(Err(err)) if err.is_not_found() => {
                return AttemptResolution::Permanent("user_not_found".to_string());
            }
            Ok(Err(err)) => {
                return AttemptResolution::Transient(format!("directory_error: {err}"));
            }
            Err(_) => {
                return AttemptResolution::Transient(format!(
                    "directory lookup timed out after {}s",
                    self.config.call_timeout_seconds
                ));
            }
        };

        if !recipient.has_contact() {
            return AttemptResolution::Permanent("no_deliverable_contact".to_string());
        }

        let language = Language::resolve(recipient.preferred_language.as_deref());
        let rendered =
            match template::render(notification.event_type, language, &notification.context) {
                Ok(rendered) => rendered,
                Err(err) => {
                    return AttemptResolution::Permanent(format!("template_error: {err}"));
                }
            };

        self.deliver_to_recipient(&recipient, &rendered, call_timeout)
            .await
    }

    /// Send through every channel the recipient has an address for.
    ///
    /// Channels run in order; the first failure aborts the attempt and
    /// marks it transient, so the sweeper runs the whole attempt again.
    async fn deliver_to_recipient(
        &self,
        recipient: &Recipient,
        rendered: &RenderedMessage,
        call_timeout: Duration,
    ) -> AttemptResolution {
        if let Some(email) = &recipient.email {
            if let Some(failure) = self
                .deliver_channel(Channel::Email, email, rendered, call_timeout)
                .await
            {
                return failure;
            }
        }

        if let Some(phone) = &recipient.phone_number {
            if let Some(failure) = self
                .deliver_channel(Channel::Sms, phone, rendered, call_timeout)
                .await
            {
                return failure;
            }
        }

        AttemptResolution::Delivered
    }

    async fn deliver_channel(
        &self,
        channel: Channel,
        address: &str,
        rendered: &RenderedMessage,
        call_timeout: Duration,
    ) -> Option<AttemptResolution> {
        let delivery = self
            .gateway
            .deliver(channel, address, &rendered.subject, &rendered.body);
        match tokio::time::timeout(call_timeout, delivery).await {
            Ok(Ok(())) => {
                DeliveryMetrics::record_channel(channel.as_str(), "ok");
                None
            }
            Ok(Err(err)) => {
                DeliveryMetrics::record_channel(channel.as_str(), "error");
                Some(AttemptResolution::Transient(format!(
                    "{channel}_delivery_failed: {err}"
                )))
            }
            Err(_) => {
                DeliveryMetrics::record_channel(channel.as_str(), "timeout");
                Some(AttemptResolution::Transient(format!(
                    "{channel} delivery timed out after {}s",
                    call_timeout.as_secs()
                )))
            }
        }
    }

    /// Write the attempt outcome back, advancing the state machine.
    async fn persist_outcome(
        &self,
        notification: &Notification,
        resolution: AttemptResolution,
    ) -> Result<(Notification, Option<String>), StoreError> {
        let attempts = notification.attempts + 1;
        let (status, reason, result_label) = match resolution {
            AttemptResolution::Delivered => (NotificationStatus::Sent, None, "delivered"),
            AttemptResolution::Permanent(reason) => {
                (NotificationStatus::Failed, Some(reason), "permanent")
            }
            AttemptResolution::Transient(reason) => {
                if attempts >= self.config.max_attempts {
                    (NotificationStatus::Failed, Some(reason), "exhausted")
                } else {
                    (NotificationStatus::Retrying, Some(reason), "retryable")
                }
            }
        };

        let updated = self
            .store
            .record_attempt(
                notification.id,
                notification.attempts,
                &AttemptRecord {
                    status,
                    attempts,
                    sent_at: Utc::now(),
                },
            )
            .await?;
        DeliveryMetrics::record_attempt(result_label);

        match updated.status {
            NotificationStatus::Sent => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    notification_id = %updated.id,
                    attempts = updated.attempts,
                    "Notification delivered"
                );
            }
            NotificationStatus::Retrying => {
                self.stats.retrying.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    notification_id = %updated.id,
                    attempts = updated.attempts,
                    max_attempts = self.config.max_attempts,
                    reason = reason.as_deref().unwrap_or(""),
                    "Delivery attempt failed, scheduled for retry"
                );
            }
            NotificationStatus::Failed => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    notification_id = %updated.id,
                    attempts = updated.attempts,
                    reason = reason.as_deref().unwrap_or(""),
                    "Notification failed permanently"
                );
            }
            NotificationStatus::Pending => {}
        }

        Ok((updated, reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MemoryDirectoryClient;
    use crate::gateway::GatewayError;
    use crate::store::MemoryNotificationStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    /// Gateway that records every delivery and fails the first
    /// `failures` calls with a transport error.
    struct ScriptedGateway {
        failures: AtomicU32,
        sent: Mutex<Vec<(Channel, String, String, String)>>,
    }

    impl ScriptedGateway {
        fn ok() -> Self {
            Self::failing(0)
        }

        fn failing(failures: u32) -> Self {
            Self {
                failures: AtomicU32::new(failures),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<(Channel, String, String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeliveryGateway for ScriptedGateway {
        async fn deliver(
            &self,
            channel: Channel,
            address: &str,
            subject: &str,
            body: &str,
        ) -> Result<(), GatewayError> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(GatewayError::Transport("connection refused".to_string()));
            }
            self.sent.lock().unwrap().push((
                channel,
                address.to_string(),
                subject.to_string(),
                body.to_string(),
            ));
            Ok(())
        }

        fn backend_name(&self) -> &'static str {
            "scripted"
        }
    }

    struct Harness {
        engine: DispatchEngine,
        store: Arc<MemoryNotificationStore>,
        directory: Arc<MemoryDirectoryClient>,
        gateway: Arc<ScriptedGateway>,
    }

    fn harness(gateway: ScriptedGateway, config: DispatchConfig) -> Harness {
        let store = Arc::new(MemoryNotificationStore::new());
        let directory = Arc::new(MemoryDirectoryClient::new());
        let gateway = Arc::new(gateway);
        let engine = DispatchEngine::new(
            store.clone(),
            directory.clone(),
            gateway.clone(),
            None,
            config,
        );
        Harness {
            engine,
            store,
            directory,
            gateway,
        }
    }

    fn full_recipient() -> Recipient {
        Recipient {
            email: Some("tenant@example.com".to_string()),
            phone_number: Some("+251911000000".to_string()),
            preferred_language: None,
        }
    }

    fn payment_request(user_id: Uuid) -> SubmitRequest {
        SubmitRequest {
            user_id,
            event_type: "payment_success".to_string(),
            context: json!({
                "property_title": "Bole Apartment",
                "location": "Addis Ababa",
                "amount": 4500,
            }),
        }
    }

    fn completed(outcome: SubmitOutcome) -> (Notification, Option<String>) {
        match outcome {
            SubmitOutcome::Completed {
                notification,
                reason,
            } => (notification, reason),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_submit_delivers_on_both_channels() {
        let h = harness(ScriptedGateway::ok(), DispatchConfig::default());
        let user_id = Uuid::new_v4();
        h.directory.insert(user_id, full_recipient());

        let outcome = h.engine.submit("tester", payment_request(user_id)).await.unwrap();
        let (notification, reason) = completed(outcome);

        assert_eq!(notification.status, NotificationStatus::Sent);
        assert_eq!(notification.attempts, 1);
        assert!(notification.sent_at.is_some());
        assert!(reason.is_none());

        let sent = h.gateway.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, Channel::Email);
        assert_eq!(sent[0].1, "tenant@example.com");
        assert!(sent[0].3.contains("Bole Apartment"));
        assert!(sent[0].3.contains("4500"));
        assert_eq!(sent[1].0, Channel::Sms);

        let stored = h.store.get(notification.id).await.unwrap().unwrap();
        assert_eq!(stored.status, NotificationStatus::Sent);
    }

    #[tokio::test]
    async fn test_submit_email_only_recipient() {
        let h = harness(ScriptedGateway::ok(), DispatchConfig::default());
        let user_id = Uuid::new_v4();
        h.directory.insert(
            user_id,
            Recipient {
                email: Some("tenant@example.com".to_string()),
                phone_number: None,
                preferred_language: None,
            },
        );

        let outcome = h.engine.submit("tester", payment_request(user_id)).await.unwrap();
        let (notification, _) = completed(outcome);

        assert_eq!(notification.status, NotificationStatus::Sent);
        assert_eq!(h.gateway.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_renders_preferred_language() {
        let h = harness(ScriptedGateway::ok(), DispatchConfig::default());
        let user_id = Uuid::new_v4();
        h.directory.insert(
            user_id,
            Recipient {
                email: Some("tenant@example.com".to_string()),
                phone_number: None,
                preferred_language: Some("am".to_string()),
            },
        );

        let outcome = h.engine.submit("tester", payment_request(user_id)).await.unwrap();
        completed(outcome);

        let sent = h.gateway.sent();
        assert_eq!(sent[0].2, "ክፍያ ተሳክቷል");
    }

    #[tokio::test]
    async fn test_submit_rejects_unknown_event_type() {
        let h = harness(ScriptedGateway::ok(), DispatchConfig::default());
        let request = SubmitRequest {
            user_id: Uuid::new_v4(),
            event_type: "lease_signed".to_string(),
            context: json!({}),
        };

        let err = h.engine.submit("tester", request).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        // Nothing was persisted
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_submit_rejects_non_object_context() {
        let h = harness(ScriptedGateway::ok(), DispatchConfig::default());
        let request = SubmitRequest {
            user_id: Uuid::new_v4(),
            event_type: "payment_success".to_string(),
            context: json!([1, 2, 3]),
        };

        let err = h.engine.submit("tester", request).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_user_fails_permanently() {
        let h = harness(ScriptedGateway::ok(), DispatchConfig::default());

        let outcome = h
            .engine
            .submit("tester", payment_request(Uuid::new_v4()))
            .await
            .unwrap();
        let (notification, reason) = completed(outcome);

        assert_eq!(notification.status, NotificationStatus::Failed);
        assert_eq!(notification.attempts, 1);
        assert_eq!(reason.as_deref(), Some("user_not_found"));
        assert!(h.gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn test_recipient_without_contact_fails_permanently() {
        let h = harness(ScriptedGateway::ok(), DispatchConfig::default());
        let user_id = Uuid::new_v4();
        h.directory.insert(
            user_id,
            Recipient {
                email: None,
                phone_number: None,
                preferred_language: None,
            },
        );

        let outcome = h.engine.submit("tester", payment_request(user_id)).await.unwrap();
        let (notification, reason) = completed(outcome);

        assert_eq!(notification.status, NotificationStatus::Failed);
        assert_eq!(reason.as_deref(), Some("no_deliverable_contact"));
    }

    #[tokio::test]
    async fn test_missing_context_key_fails_permanently() {
        let h = harness(ScriptedGateway::ok(), DispatchConfig::default());
        let user_id = Uuid::new_v4();
        h.directory.insert(user_id, full_recipient());

        let request = SubmitRequest {
            user_id,
            event_type: "payment_success".to_string(),
            context: json!({"property_title": "Bole Apartment"}),
        };
        let outcome = h.engine.submit("tester", request).await.unwrap();
        let (notification, reason) = completed(outcome);

        assert_eq!(notification.status, NotificationStatus::Failed);
        let reason = reason.unwrap();
        assert!(reason.starts_with("template_error:"), "{reason}");
        assert!(h.gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_failure_schedules_retry() {
        let h = harness(ScriptedGateway::failing(10), DispatchConfig::default());
        let user_id = Uuid::new_v4();
        h.directory.insert(user_id, full_recipient());

        let outcome = h.engine.submit("tester", payment_request(user_id)).await.unwrap();
        let (notification, reason) = completed(outcome);

        assert_eq!(notification.status, NotificationStatus::Retrying);
        assert_eq!(notification.attempts, 1);
        assert!(reason.unwrap().contains("email_delivery_failed"));
    }

    #[tokio::test]
    async fn test_gateway_failure_exhausts_at_attempt_ceiling() {
        let config = DispatchConfig {
            max_attempts: 1,
            ..DispatchConfig::default()
        };
        let h = harness(ScriptedGateway::failing(10), config);
        let user_id = Uuid::new_v4();
        h.directory.insert(user_id, full_recipient());

        let outcome = h.engine.submit("tester", payment_request(user_id)).await.unwrap();
        let (notification, _) = completed(outcome);

        // With a ceiling of one the first failure is terminal
        assert_eq!(notification.status, NotificationStatus::Failed);
        assert_eq!(notification.attempts, 1);
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failure() {
        let h = harness(ScriptedGateway::failing(1), DispatchConfig::default());
        let user_id = Uuid::new_v4();
        h.directory.insert(user_id, full_recipient());

        let outcome = h.engine.submit("tester", payment_request(user_id)).await.unwrap();
        let (notification, _) = completed(outcome);
        assert_eq!(notification.status, NotificationStatus::Retrying);

        let updated = h.engine.retry(&notification).await.unwrap();
        assert_eq!(updated.status, NotificationStatus::Sent);
        assert_eq!(updated.attempts, 2);
    }

    #[tokio::test]
    async fn test_stale_retry_loses_the_race() {
        let h = harness(ScriptedGateway::failing(1), DispatchConfig::default());
        let user_id = Uuid::new_v4();
        h.directory.insert(user_id, full_recipient());

        let outcome = h.engine.submit("tester", payment_request(user_id)).await.unwrap();
        let (notification, _) = completed(outcome);

        // First retry advances the record
        h.engine.retry(&notification).await.unwrap();

        // A second retry from the same stale snapshot must not double-count
        let err = h.engine.retry(&notification).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Store(StoreError::Conflict { .. })
        ));
        let stored = h.store.get(notification.id).await.unwrap().unwrap();
        assert_eq!(stored.attempts, 2);
    }

    #[tokio::test]
    async fn test_rate_limited_submit_creates_no_record() {
        let store = Arc::new(MemoryNotificationStore::new());
        let directory = Arc::new(MemoryDirectoryClient::new());
        let gateway = Arc::new(ScriptedGateway::ok());
        let limiter = Arc::new(RateLimiter::new(2, 60));
        let engine = DispatchEngine::new(
            store.clone(),
            directory.clone(),
            gateway,
            Some(limiter),
            DispatchConfig::default(),
        );

        let user_id = Uuid::new_v4();
        directory.insert(user_id, full_recipient());

        for _ in 0..2 {
            let outcome = engine.submit("tester", payment_request(user_id)).await.unwrap();
            assert!(matches!(outcome, SubmitOutcome::Completed { .. }));
        }

        let outcome = engine.submit("tester", payment_request(user_id)).await.unwrap();
        match outcome {
            SubmitOutcome::Rejected {
                retry_after, limit, ..
            } => {
                assert!(retry_after >= 1);
                assert_eq!(limit, 2);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(store.len(), 2);
        assert_eq!(engine.stats().rejected, 1);
    }

    #[tokio::test]
    async fn test_engine_stats_track_outcomes() {
        let h = harness(ScriptedGateway::failing(1), DispatchConfig::default());
        let user_id = Uuid::new_v4();
        h.directory.insert(user_id, full_recipient());

        h.engine.submit("tester", payment_request(user_id)).await.unwrap();
        h.engine
            .submit("tester", payment_request(Uuid::new_v4()))
            .await
            .unwrap();

        let stats = h.engine.stats();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.retrying, 1);
        assert_eq!(stats.failed, 1);
    }
}
