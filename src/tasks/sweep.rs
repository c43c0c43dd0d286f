use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::{DispatchConfig, RateLimitConfig};
use crate::directory::CachedDirectory;
use crate::dispatch::RetrySweeper;
use crate::ratelimit::RateLimiter;

/// Background task driving retry sweeps and periodic maintenance.
///
/// The sweeper itself carries no schedule; this task is the one place
/// that decides when `sweep_once` runs in production. Maintenance
/// covers the bookkeeping nothing else triggers: dropping idle rate
/// limit windows and expired directory cache entries.
pub struct SweepTask {
    dispatch: DispatchConfig,
    ratelimit: RateLimitConfig,
    sweeper: Arc<RetrySweeper>,
    rate_limiter: Option<Arc<RateLimiter>>,
    directory: Arc<CachedDirectory>,
    shutdown: broadcast::Receiver<()>,
}

impl SweepTask {
    pub fn new(
        dispatch: DispatchConfig,
        ratelimit: RateLimitConfig,
        sweeper: Arc<RetrySweeper>,
        rate_limiter: Option<Arc<RateLimiter>>,
        directory: Arc<CachedDirectory>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            dispatch,
            ratelimit,
            sweeper,
            rate_limiter,
            directory,
            shutdown,
        }
    }

    /// Run the sweep and maintenance loops until shutdown.
    pub async fn run(mut self) {
        let sweep_interval = Duration::from_secs(self.dispatch.sweep_interval_seconds.max(1));
        let maintenance_interval =
            Duration::from_secs(self.ratelimit.cleanup_interval_seconds.max(1));

        let mut sweep_timer = tokio::time::interval(sweep_interval);
        let mut maintenance_timer = tokio::time::interval(maintenance_interval);

        // Skip immediate first tick
        sweep_timer.tick().await;
        maintenance_timer.tick().await;

        tracing::info!(
            sweep_interval_secs = self.dispatch.sweep_interval_seconds,
            maintenance_interval_secs = self.ratelimit.cleanup_interval_seconds,
            "Sweep task started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Sweep task received shutdown signal");
                    break;
                }
                _ = sweep_timer.tick() => {
                    self.run_sweep().await;
                }
                _ = maintenance_timer.tick() => {
                    self.run_maintenance();
                }
            }
        }

        tracing::info!("Sweep task stopped");
    }

    async fn run_sweep(&self) {
        // The sweeper reports its own summary; only failures to sweep
        // at all are worth logging here
        if let Err(e) = self.sweeper.sweep_once().await {
            tracing::error!(error = %e, "Scheduled sweep failed");
        }
    }

    fn run_maintenance(&self) {
        if let Some(limiter) = &self.rate_limiter {
            let removed = limiter.cleanup_stale();
            if removed > 0 {
                tracing::debug!(removed, "Dropped idle rate limit windows");
            }
        }

        let purged = self.directory.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, "Dropped expired directory cache entries");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use serde_json::json;
    use uuid::Uuid;

    use crate::directory::{DirectoryClient, MemoryDirectoryClient, Recipient};
    use crate::dispatch::{DispatchEngine, SubmitOutcome, SubmitRequest};
    use crate::gateway::LogDeliveryGateway;
    use crate::notification::NotificationStatus;
    use crate::store::{MemoryNotificationStore, NotificationStore};

    fn dispatch_config() -> DispatchConfig {
        DispatchConfig {
            max_attempts: 3,
            call_timeout_seconds: 5,
            sweep_batch_size: 10,
            sweep_interval_seconds: 1,
            sweep_concurrency: 4,
        }
    }

    fn ratelimit_config() -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            max_requests: 10,
            window_seconds: 60,
            cleanup_interval_seconds: 1,
        }
    }

    fn seeded_directory() -> (Arc<MemoryDirectoryClient>, Uuid) {
        let directory = Arc::new(MemoryDirectoryClient::new());
        let user_id = Uuid::new_v4();
        directory.insert(
            user_id,
            Recipient {
                email: Some("tenant@example.com".to_string()),
                phone_number: None,
                preferred_language: Some("en".to_string()),
            },
        );
        (directory, user_id)
    }

    #[tokio::test]
    async fn shutdown_stops_the_task() {
        let (directory, user_id) = seeded_directory();
        let store: Arc<dyn NotificationStore> = Arc::new(MemoryNotificationStore::new());
        let engine = Arc::new(DispatchEngine::new(
            store.clone(),
            directory.clone() as Arc<dyn DirectoryClient>,
            Arc::new(LogDeliveryGateway::new()),
            None,
            dispatch_config(),
        ));
        let outcome = engine
            .submit(
                "test",
                SubmitRequest {
                    user_id,
                    event_type: "payment_success".to_string(),
                    context: json!({
                        "property_title": "Bole Apartment",
                        "location": "Addis Ababa",
                        "amount": "15000",
                    }),
                },
            )
            .await
            .unwrap();
        match outcome {
            SubmitOutcome::Completed { notification, .. } => {
                assert_eq!(notification.status, NotificationStatus::Sent);
            }
            SubmitOutcome::Rejected { .. } => panic!("not rate limited"),
        }

        let sweeper = Arc::new(RetrySweeper::new(engine));
        let cached =
            Arc::new(crate::directory::CachedDirectory::new(directory, Duration::from_secs(60)));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task = SweepTask::new(
            dispatch_config(),
            ratelimit_config(),
            sweeper,
            None,
            cached,
            shutdown_rx,
        );
        let handle = tokio::spawn(task.run());

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("task did not stop on shutdown")
            .unwrap();
    }
}
