//! Per-host circuit breaker.
//!
//! # States
//! - Closed: consecutive failures below threshold, requests pass
//! - Open: `now < open_until`, requests fail fast
//!
//! ```text
//! Closed → Open: failures reaches threshold (open_until = now + cooldown)
//! Open → Closed: implicitly once now >= open_until
//! ```
//!
//! A success resets the failure counter. After cooldown the counter is still
//! at or above the threshold, so one more failure re-opens immediately.

use std::time::Duration;
use tokio::time::Instant;

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Requests pass through.
    Closed,
    /// Requests are refused for the remaining duration.
    Open {
        /// Time left in the cooldown.
        remaining: Duration,
    },
}

impl BreakerState {
    /// Returns true if the circuit is open.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerState::Open { .. })
    }

    /// Returns true if the circuit is closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, BreakerState::Closed)
    }
}

/// Failure tracking for one host.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    failures: u32,
    threshold: u32,
    cooldown: Duration,
    open_until: Option<Instant>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            failures: 0,
            threshold: threshold.max(1),
            cooldown,
            open_until: None,
        }
    }

    /// State as of `now`.
    pub fn state(&self, now: Instant) -> BreakerState {
        match self.open_until {
            Some(until) if now < until => BreakerState::Open {
                remaining: until - now,
            },
            _ => BreakerState::Closed,
        }
    }

    /// Fail with the remaining cooldown if the circuit is open.
    pub fn ensure_closed(&self, now: Instant) -> Result<(), Duration> {
        match self.state(now) {
            BreakerState::Closed => Ok(()),
            BreakerState::Open { remaining } => Err(remaining),
        }
    }

    /// Count a failure. Returns true if this call opened the circuit.
    pub fn record_failure(&mut self, now: Instant) -> bool {
        self.failures = self.failures.saturating_add(1);
        if self.failures >= self.threshold {
            self.open_until = Some(now + self.cooldown);
            return true;
        }
        false
    }

    /// Count a success: the failure counter goes back to zero.
    pub fn record_success(&mut self) {
        self.failures = 0;
    }

    /// Consecutive failures recorded since the last success.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}
