//! TTL cache over a directory backend.
//!
//! Successful lookups are cached for a configurable TTL so retry sweeps
//! and bursts of events for the same user do not hammer the directory.
//! Not-found answers and transport errors are never cached.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::metrics::DirectoryMetrics;

use super::{DirectoryClient, DirectoryError, Recipient};

struct CacheEntry {
    recipient: Recipient,
    cached_at: Instant,
}

/// Caching decorator around any [`DirectoryClient`].
///
/// A TTL of zero disables caching entirely; every lookup goes through.
pub struct CachedDirectory {
    inner: Arc<dyn DirectoryClient>,
    entries: DashMap<Uuid, CacheEntry>,
    ttl: Duration,
}

impl CachedDirectory {
    pub fn new(inner: Arc<dyn DirectoryClient>, ttl: Duration) -> Self {
        Self {
            inner,
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Number of entries currently cached (expired or not).
    pub fn cached_entries(&self) -> usize {
        self.entries.len()
    }

    /// Drop entries past their TTL.
    ///
    /// Returns the number of entries removed. Called periodically by the
    /// maintenance task; lookups also evict lazily.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.cached_at.elapsed() < self.ttl);
        let removed = before.saturating_sub(self.entries.len());

        if removed > 0 {
            tracing::debug!(removed, "Purged expired directory cache entries");
        }

        removed
    }

    /// Forget a single user, e.g. after a bounce report.
    pub fn invalidate(&self, user_id: &Uuid) {
        self.entries.remove(user_id);
    }
}

#[async_trait]
impl DirectoryClient for CachedDirectory {
    async fn lookup(&self, user_id: Uuid) -> Result<Recipient, DirectoryError> {
        if self.ttl > Duration::ZERO {
            if let Some(entry) = self.entries.get(&user_id) {
                if entry.cached_at.elapsed() < self.ttl {
                    DirectoryMetrics::record_cache_hit();
                    return Ok(entry.recipient.clone());
                }
            }
            // Entry is absent or expired at this point
            self.entries.remove(&user_id);
        }

        DirectoryMetrics::record_cache_miss();
        let recipient = self.inner.lookup(user_id).await?;

        if self.ttl > Duration::ZERO {
            self.entries.insert(
                user_id,
                CacheEntry {
                    recipient: recipient.clone(),
                    cached_at: Instant::now(),
                },
            );
        }

        Ok(recipient)
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}
