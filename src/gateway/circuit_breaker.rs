//! Circuit breaker for delivery provider calls.
//!
//! Each channel gets its own breaker: a broken email provider must not
//! stop SMS deliveries. An open circuit fails the delivery fast, which
//! still counts as a completed attempt for the notification record.

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU8, Ordering};

use serde::Serialize;

use super::current_time_ms;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CircuitState {
    /// Circuit is closed, provider calls flow through normally
    Closed = 0,
    /// Circuit is open, provider calls are rejected without being made
    Open = 1,
    /// Circuit is half-open, allowing probe calls
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }

    /// Numeric encoding for the Prometheus gauge
    pub fn as_gauge_value(&self) -> i64 {
        *self as u8 as i64
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Successes in half-open state before closing
    pub success_threshold: u32,
    /// Time to wait before transitioning from open to half-open (ms)
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout_ms: 30_000, // 30 seconds
        }
    }
}

/// Lock-free circuit breaker.
///
/// State lives in atomics so delivery tasks can consult and update it
/// without contention. A single streak counter suffices: while closed
/// it counts consecutive failures, while half-open it counts probe
/// successes. The two never overlap.
pub struct CircuitBreaker {
    /// Current state (0=Closed, 1=Open, 2=HalfOpen)
    state: AtomicU8,
    /// Consecutive failures (closed) or probe successes (half-open)
    streak: AtomicU32,
    /// Timestamp of last state change (ms since epoch)
    last_state_change: AtomicI64,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            state: AtomicU8::new(CircuitState::Closed as u8),
            streak: AtomicU32::new(0),
            last_state_change: AtomicI64::new(current_time_ms()),
            config,
        }
    }

    /// Get the current state, applying the open-to-half-open timeout
    pub fn state(&self) -> CircuitState {
        self.check_state_transition();
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Whether a provider call should be made right now
    pub fn allow_request(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => true, // Allow probe calls
        }
    }

    /// Record a successful provider call
    pub fn record_success(&self) {
        match CircuitState::from(self.state.load(Ordering::Acquire)) {
            CircuitState::Closed => {
                self.streak.store(0, Ordering::Release);
            }
            CircuitState::HalfOpen => {
                let successes = self.streak.fetch_add(1, Ordering::AcqRel) + 1;
                if successes >= self.config.success_threshold {
                    self.transition_to(CircuitState::Closed);
                    tracing::info!("Delivery circuit breaker closed after recovery");
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed provider call
    pub fn record_failure(&self) {
        match CircuitState::from(self.state.load(Ordering::Acquire)) {
            CircuitState::Closed => {
                let failures = self.streak.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= self.config.failure_threshold {
                    self.transition_to(CircuitState::Open);
                    tracing::warn!(
                        failures,
                        "Delivery circuit breaker opened after consecutive provider failures"
                    );
                }
            }
            CircuitState::HalfOpen => {
                // Any failure during a probe reopens the circuit
                self.transition_to(CircuitState::Open);
                tracing::warn!("Delivery circuit breaker reopened after failed probe");
            }
            CircuitState::Open => {
                // Already open, push the reset deadline out
                self.last_state_change
                    .store(current_time_ms(), Ordering::Release);
            }
        }
    }

    /// Transition from Open to HalfOpen once the reset timeout has passed
    fn check_state_transition(&self) {
        if CircuitState::from(self.state.load(Ordering::Acquire)) != CircuitState::Open {
            return;
        }

        let last_change = self.last_state_change.load(Ordering::Acquire);
        if current_time_ms() - last_change < self.config.reset_timeout_ms as i64 {
            return;
        }

        // CAS so concurrent readers race to a single transition
        if self
            .state
            .compare_exchange(
                CircuitState::Open as u8,
                CircuitState::HalfOpen as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            self.streak.store(0, Ordering::Release);
            self.last_state_change
                .store(current_time_ms(), Ordering::Release);
            tracing::info!("Delivery circuit breaker probing provider (half-open)");
        }
    }

    fn transition_to(&self, new_state: CircuitState) {
        self.state.store(new_state as u8, Ordering::Release);
        self.streak.store(0, Ordering::Release);
        self.last_state_change
            .store(current_time_ms(), Ordering::Release);
    }

    /// Statistics snapshot for health and stats endpoints
    pub fn stats(&self) -> CircuitBreakerStats {
        CircuitBreakerStats {
            state: self.state(),
            streak: self.streak.load(Ordering::Acquire),
            last_state_change_ms: self.last_state_change.load(Ordering::Acquire),
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

/// Circuit breaker statistics
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    /// Consecutive failures (closed) or probe successes (half-open)
    pub streak: u32,
    pub last_state_change_ms: i64,
}
