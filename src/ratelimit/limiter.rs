//! Per-caller rate limiter built on fixed windows.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

use crate::metrics::RateLimitMetrics;

use super::window::FixedWindow;

/// Outcome of a rate limit check.
///
/// `reset_at` is the Unix second at which the current window closes,
/// for both variants. A denied request is never counted, so denials do
/// not extend the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed {
        /// Requests left in the window after this one
        remaining: u32,
        limit: u32,
        reset_at: i64,
    },
    Denied {
        /// Seconds until the window closes, at least 1
        retry_after: u64,
        limit: u32,
        reset_at: i64,
    },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

/// Counters exposed on the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterStats {
    pub active_callers: usize,
    pub allowed_total: u64,
    pub denied_total: u64,
    pub limit: u32,
    pub window_seconds: u64,
}

/// Fixed-window rate limiter keyed by caller.
///
/// Each caller gets an independent window; windows are epoch-aligned
/// so all callers roll over together. Stale entries are dropped by the
/// periodic maintenance task via [`RateLimiter::cleanup_stale`].
pub struct RateLimiter {
    windows: DashMap<String, FixedWindow>,
    max_requests: u32,
    window_seconds: u64,
    allowed: AtomicU64,
    denied: AtomicU64,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window_seconds: window_seconds.max(1),
            allowed: AtomicU64::new(0),
            denied: AtomicU64::new(0),
        }
    }

    /// Check whether `caller` may make a request right now.
    ///
    /// An allowed request is counted against the caller's window; a
    /// denied one leaves no trace beyond the denial counter.
    pub fn check(&self, caller: &str) -> RateLimitDecision {
        self.check_at(caller, FixedWindow::now_secs())
    }

    fn check_at(&self, caller: &str, now: i64) -> RateLimitDecision {
        let window_index = (now / self.window_seconds as i64) as u32;
        let reset_at = (window_index as i64 + 1) * self.window_seconds as i64;

        let acquired = self
            .windows
            .entry(caller.to_string())
            .or_default()
            .try_acquire(self.max_requests, window_index, now);

        match acquired {
            Some(count) => {
                self.allowed.fetch_add(1, Ordering::Relaxed);
                RateLimitMetrics::record_allowed();
                RateLimitDecision::Allowed {
                    remaining: self.max_requests.saturating_sub(count),
                    limit: self.max_requests,
                    reset_at,
                }
            }
            None => {
                self.denied.fetch_add(1, Ordering::Relaxed);
                RateLimitMetrics::record_denied();
                tracing::debug!(
                    caller = %caller,
                    retry_after = (reset_at - now).max(1),
                    "Rate limit exceeded"
                );
                RateLimitDecision::Denied {
                    retry_after: (reset_at - now).max(1) as u64,
                    limit: self.max_requests,
                    reset_at,
                }
            }
        }
    }

    /// Drop windows idle for at least two window lengths.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_stale(&self) -> usize {
        self.cleanup_stale_at(FixedWindow::now_secs())
    }

    fn cleanup_stale_at(&self, now: i64) -> usize {
        let horizon = 2 * self.window_seconds as i64;
        let before = self.windows.len();
        self.windows
            .retain(|_, window| now - window.last_activity() < horizon);
        let removed = before.saturating_sub(self.windows.len());

        RateLimitMetrics::set_active_windows(self.windows.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.windows.len(), "Cleaned up idle rate limit windows");
        }
        removed
    }

    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            active_callers: self.windows.len(),
            allowed_total: self.allowed.load(Ordering::Relaxed),
            denied_total: self.denied.load(Ordering::Relaxed),
            limit: self.max_requests,
            window_seconds: self.window_seconds,
        }
    }
}
