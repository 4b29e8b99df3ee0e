//! Per-host token bucket.
//!
//! Refill is lazy and continuous: on every check the bucket adds
//! `elapsed_seconds * refill_rate` tokens, capped at capacity.

use std::time::Duration;
use tokio::time::Instant;

/// Token bucket rate limiter state for one host.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(capacity: u32, refill_rate: f64, now: Instant) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            capacity,
            tokens: capacity,
            refill_rate,
            last_refill: now,
        }
    }

    /// Bring the token count up to date with `now`.
    pub fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Take one token if available.
    ///
    /// # Returns
    /// * `Ok(())` - A token was consumed
    /// * `Err(wait)` - How long until a token will be available
    pub fn try_acquire(&mut self, now: Instant) -> Result<(), Duration> {
        self.refill(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return Ok(());
        }

        let deficit = 1.0 - self.tokens;
        let micros = (deficit / self.refill_rate * 1_000_000.0).ceil();
        Err(Duration::from_micros(micros.max(1.0) as u64))
    }

    /// Current token count (as of the last refill).
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// Maximum tokens.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }
}
