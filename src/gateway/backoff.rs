//! Exponential backoff for provider transport retries.
//!
//! Used inside the HTTP gateway between transport-level tries of a
//! single delivery. The dispatch pipeline never sees these waits; one
//! `deliver` call remains one attempt.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff configuration
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first re-try, in milliseconds
    pub initial_delay_ms: u64,
    /// Ceiling any delay is clamped to, in milliseconds
    pub max_delay_ms: u64,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 5_000,
            multiplier: 2.0,
            jitter_factor: 0.1, // 10% jitter
        }
    }
}

/// Exponential backoff calculator with jitter.
///
/// Delays are derived from the try counter, so jitter never compounds:
/// the n-th delay is `initial * multiplier^(n-1)`, clamped to the
/// ceiling, with jitter applied on top.
pub struct ExponentialBackoff {
    config: BackoffConfig,
    tries: u32,
}

impl ExponentialBackoff {
    pub fn with_config(config: BackoffConfig) -> Self {
        Self { config, tries: 0 }
    }

    /// Delay to sleep before the next transport try.
    pub fn next_delay(&mut self) -> Duration {
        // Clamped so powi cannot overflow to infinity
        let exponent = self.tries.min(16) as i32;
        self.tries += 1;

        let base = self.config.initial_delay_ms as f64 * self.config.multiplier.powi(exponent);
        let clamped = base.min(self.config.max_delay_ms as f64);

        let with_jitter = if self.config.jitter_factor > 0.0 {
            let spread = clamped * self.config.jitter_factor;
            clamped + rand::rng().random_range(-spread..spread)
        } else {
            clamped
        };

        Duration::from_millis(with_jitter.max(1.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(jitter_factor: f64) -> BackoffConfig {
        BackoffConfig {
            initial_delay_ms: 1_000,
            max_delay_ms: 10_000,
            multiplier: 2.0,
            jitter_factor,
        }
    }

    #[test]
    fn test_first_delay_is_the_initial_delay() {
        let mut backoff = ExponentialBackoff::with_config(config(0.0));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1_000));
    }

    #[test]
    fn test_delays_double_until_the_ceiling() {
        let mut backoff = ExponentialBackoff::with_config(config(0.0));

        let delays: Vec<u64> = (0..6).map(|_| backoff.next_delay().as_millis() as u64).collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 10_000, 10_000]);
    }

    #[test]
    fn test_jitter_stays_within_the_spread() {
        let mut backoff = ExponentialBackoff::with_config(config(0.2));

        for _ in 0..50 {
            let mut fresh = ExponentialBackoff::with_config(config(0.2));
            let delay = fresh.next_delay().as_millis() as u64;
            assert!((800..=1_200).contains(&delay), "delay {delay} out of bounds");
        }

        // Jitter is re-drawn per call, not compounded
        backoff.next_delay();
        let second = backoff.next_delay().as_millis() as u64;
        assert!((1_600..=2_400).contains(&second), "delay {second} out of bounds");
    }
}
