//! Fixed window counter implementation

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::SystemTime;

/// Fixed window counter for rate limiting.
///
/// Uses atomic operations for lock-free concurrent access. The window
/// index and the request count live in one packed u64 so a window
/// rollover and a count reset can never be observed separately.
/// Windows are aligned to the Unix epoch, so every caller's window
/// boundaries fall on the same instants.
#[derive(Debug)]
pub struct FixedWindow {
    /// Window index in the high 32 bits, request count in the low 32
    state: AtomicU64,
    /// Last acquire timestamp (Unix seconds), for stale-entry cleanup
    last_seen: AtomicI64,
}

fn pack(window_index: u32, count: u32) -> u64 {
    ((window_index as u64) << 32) | count as u64
}

fn unpack(state: u64) -> (u32, u32) {
    ((state >> 32) as u32, state as u32)
}

impl FixedWindow {
    pub fn new() -> Self {
        Self {
            state: AtomicU64::new(0),
            last_seen: AtomicI64::new(Self::now_secs()),
        }
    }

    /// Get current time in Unix seconds
    pub fn now_secs() -> i64 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    /// Try to count one request against the window containing `now`.
    ///
    /// Returns `Some(count)` with the new in-window count if the
    /// request fits under `limit`, `None` if the window is full.
    /// A full window leaves the count untouched.
    pub fn try_acquire(&self, limit: u32, window_index: u32, now: i64) -> Option<u32> {
        self.last_seen.store(now, Ordering::Relaxed);

        loop {
            let current = self.state.load(Ordering::Relaxed);
            let (stored_index, stored_count) = unpack(current);

            // A new window starts from zero
            let count = if stored_index == window_index {
                stored_count
            } else {
                0
            };

            if count >= limit {
                return None;
            }

            let next = pack(window_index, count + 1);
            if self
                .state
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return Some(count + 1);
            }
            // CAS failed, retry
        }
    }

    /// Current count inside the window `window_index`, zero if the
    /// stored window is older.
    pub fn count_in(&self, window_index: u32) -> u32 {
        let (stored_index, stored_count) = unpack(self.state.load(Ordering::Relaxed));
        if stored_index == window_index {
            stored_count
        } else {
            0
        }
    }

    /// Get the last acquire time
    pub fn last_activity(&self) -> i64 {
        self.last_seen.load(Ordering::Relaxed)
    }
}

impl Default for FixedWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_fills_to_limit() {
        let window = FixedWindow::new();

        for expected in 1..=10 {
            assert_eq!(window.try_acquire(10, 7, 420), Some(expected));
        }

        // Eleventh request in the same window is refused
        assert_eq!(window.try_acquire(10, 7, 421), None);
        assert_eq!(window.count_in(7), 10);
    }

    #[test]
    fn test_refused_request_not_counted() {
        let window = FixedWindow::new();
        for _ in 0..3 {
            window.try_acquire(3, 1, 60).unwrap();
        }

        assert_eq!(window.try_acquire(3, 1, 61), None);
        assert_eq!(window.try_acquire(3, 1, 62), None);
        assert_eq!(window.count_in(1), 3);
    }

    #[test]
    fn test_rollover_resets_count() {
        let window = FixedWindow::new();
        for _ in 0..10 {
            window.try_acquire(10, 1, 60).unwrap();
        }
        assert_eq!(window.try_acquire(10, 1, 119), None);

        // Next window starts fresh
        assert_eq!(window.try_acquire(10, 2, 120), Some(1));
        assert_eq!(window.count_in(2), 1);
        assert_eq!(window.count_in(1), 0);
    }

    #[test]
    fn test_zero_limit_always_refuses() {
        let window = FixedWindow::new();
        assert_eq!(window.try_acquire(0, 1, 60), None);
    }

    #[test]
    fn test_last_activity_tracked() {
        let window = FixedWindow::new();
        window.try_acquire(10, 5, 300);
        assert_eq!(window.last_activity(), 300);
        window.try_acquire(10, 5, 307);
        assert_eq!(window.last_activity(), 307);
    }
}
