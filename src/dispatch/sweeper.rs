//! Retry sweeper.
//!
//! One sweep loads a batch of retry-eligible records and feeds each
//! back through the engine. The sweeper itself carries no schedule;
//! whoever owns it decides when to sweep (the background task on a
//! timer, the retry endpoint on demand, a test directly).

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use uuid::Uuid;

use crate::metrics::SweepMetrics;
use crate::notification::{Notification, NotificationStatus};
use crate::store::StoreError;

use super::{DispatchEngine, EngineError};

/// What one sweep did
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepReport {
    /// Records picked up and re-attempted
    pub retried: usize,
    /// Re-attempts that delivered
    pub delivered: usize,
    /// Re-attempts that failed transiently, still under the ceiling
    pub still_retrying: usize,
    /// Records that hit the attempt ceiling or failed permanently
    pub exhausted: usize,
    /// Records skipped over store errors or lost races
    pub errors: usize,
}

/// Drives retries through the engine in bounded batches.
pub struct RetrySweeper {
    engine: Arc<DispatchEngine>,
}

impl RetrySweeper {
    pub fn new(engine: Arc<DispatchEngine>) -> Self {
        Self { engine }
    }

    /// Run one sweep and report what happened.
    ///
    /// Every record is handled in isolation: one bad record never
    /// blocks the rest of the batch. Only the initial listing can fail
    /// the sweep as a whole.
    #[tracing::instrument(name = "sweeper.sweep_once", skip(self))]
    pub async fn sweep_once(&self) -> Result<SweepReport, StoreError> {
        let started = Instant::now();
        let config = self.engine.config();
        let batch = self
            .engine
            .store()
            .list_retry_eligible(config.max_attempts, config.sweep_batch_size)
            .await?;

        if batch.is_empty() {
            tracing::trace!("No notifications eligible for retry");
            SweepMetrics::record_sweep(0, started.elapsed().as_secs_f64());
            return Ok(SweepReport::default());
        }

        let mut report = SweepReport {
            retried: batch.len(),
            ..SweepReport::default()
        };

        let concurrency = config.sweep_concurrency.max(1);
        let mut futures = FuturesUnordered::new();
        let mut pending = 0;

        for record in batch {
            let engine = self.engine.clone();
            futures.push(async move {
                let id = record.id;
                (id, engine.retry(&record).await)
            });
            pending += 1;

            // Process completed retries when we hit the concurrency limit
            while pending >= concurrency {
                if let Some((id, result)) = futures.next().await {
                    pending -= 1;
                    Self::tally(&mut report, id, result);
                } else {
                    break;
                }
            }
        }

        // Process remaining retries
        while let Some((id, result)) = futures.next().await {
            Self::tally(&mut report, id, result);
        }

        let duration = started.elapsed();
        SweepMetrics::record_sweep(report.retried, duration.as_secs_f64());
        tracing::info!(
            retried = report.retried,
            delivered = report.delivered,
            still_retrying = report.still_retrying,
            exhausted = report.exhausted,
            errors = report.errors,
            duration_ms = duration.as_millis() as u64,
            "Retry sweep complete"
        );

        Ok(report)
    }

    fn tally(report: &mut SweepReport, id: Uuid, result: Result<Notification, EngineError>) {
        match result {
            Ok(updated) => match updated.status {
                NotificationStatus::Sent => report.delivered += 1,
                NotificationStatus::Retrying => report.still_retrying += 1,
                NotificationStatus::Failed => report.exhausted += 1,
                NotificationStatus::Pending => {}
            },
            Err(EngineError::Store(err)) if err.is_conflict() => {
                // Another writer advanced this record since it was listed
                tracing::debug!(notification_id = %id, "Skipping retry, record moved on");
                report.errors += 1;
            }
            Err(err) => {
                tracing::warn!(notification_id = %id, error = %err, "Retry failed");
                report.errors += 1;
            }
        }
    }
}
