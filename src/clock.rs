//! Clock abstraction for timestamps and rate/breaker timing.
//!
//! Wall time stamps structured events. Monotonic time drives the token
//! bucket and circuit breaker; it comes from `tokio::time` so paused-time
//! tests advance it deterministically.

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Clock trait for deterministic time in tests.
pub trait Clock: Send + Sync {
    /// Get the current UTC time.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Monotonic instant for elapsed-time arithmetic.
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// System clock using actual wall time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock with frozen wall time, for reproducible event records.
///
/// Monotonic time still follows tokio, so pair it with
/// `#[tokio::test(start_paused = true)]` when timing matters.
#[cfg(any(test, feature = "test-seams"))]
#[derive(Debug, Clone)]
pub struct MockClock {
    now: DateTime<Utc>,
}

#[cfg(any(test, feature = "test-seams"))]
impl MockClock {
    /// Create a mock clock frozen at the given time.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// Create a mock clock from an RFC 3339 string.
    pub fn from_rfc3339(s: &str) -> Result<Self, chrono::ParseError> {
        Ok(Self {
            now: DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc),
        })
    }
}

#[cfg(any(test, feature = "test-seams"))]
impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use std::time::Duration;

    #[test]
    fn system_clock_returns_time() {
        let now = SystemClock.now_utc();
        assert!(now.year() >= 2024);
    }

    #[test]
    fn mock_clock_is_frozen() {
        let clock = MockClock::from_rfc3339("2025-01-15T12:00:00Z").unwrap();
        assert_eq!(clock.now_utc().to_rfc3339(), "2025-01-15T12:00:00+00:00");
        assert_eq!(clock.now_utc().to_rfc3339(), "2025-01-15T12:00:00+00:00");
    }

    #[test]
    fn mock_clock_rejects_garbage() {
        assert!(MockClock::from_rfc3339("yesterday").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn monotonic_time_follows_paused_runtime() {
        let clock = SystemClock;
        let start = clock.now();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(clock.now() - start, Duration::from_secs(5));
    }
}
