//! Retry classification and backoff delays.

use std::time::Duration;

/// Base delay for the first retry.
pub const BASE_BACKOFF_MS: u64 = 1_000;

/// Ceiling for any computed backoff.
pub const MAX_BACKOFF_MS: u64 = 8_000;

/// Longest wait a server can request through `Retry-After`.
pub const MAX_RETRY_AFTER_SECS: u64 = 60;

/// Status codes that are retried: 429 and every 5xx.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

/// Capped exponential backoff: `min(1000 * 2^attempt, 8000)` ms.
///
/// `attempt` is zero-based, so the first retry waits one second.
pub fn exponential_backoff(attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt);
    Duration::from_millis(BASE_BACKOFF_MS.saturating_mul(factor).min(MAX_BACKOFF_MS))
}

/// Parse a `Retry-After` value given in whole seconds.
///
/// Only positive integers are honoured; zero, negatives and HTTP-date forms
/// return `None` so the caller falls back to exponential backoff. Values
/// above [`MAX_RETRY_AFTER_SECS`] are clamped to it.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    match value.trim().parse::<u64>() {
        Ok(seconds) if seconds > 0 => {
            Some(Duration::from_secs(seconds.min(MAX_RETRY_AFTER_SECS)))
        }
        _ => None,
    }
}

/// Delay before the next retry of a retryable HTTP status.
pub fn status_retry_delay(retry_after: Option<&str>, attempt: u32) -> Duration {
    retry_after
        .and_then(parse_retry_after)
        .unwrap_or_else(|| exponential_backoff(attempt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(599));
        assert!(!is_retryable_status(200));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(428));
        assert!(!is_retryable_status(600));
    }

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(exponential_backoff(0), Duration::from_millis(1_000));
        assert_eq!(exponential_backoff(1), Duration::from_millis(2_000));
        assert_eq!(exponential_backoff(2), Duration::from_millis(4_000));
        assert_eq!(exponential_backoff(3), Duration::from_millis(8_000));
        assert_eq!(exponential_backoff(4), Duration::from_millis(8_000));
        assert_eq!(exponential_backoff(200), Duration::from_millis(8_000));
    }

    #[test]
    fn retry_after_positive_integer_only() {
        assert_eq!(parse_retry_after("3"), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after(" 45 "), Some(Duration::from_secs(45)));
        assert_eq!(parse_retry_after("0"), None);
        assert_eq!(parse_retry_after("-5"), None);
        assert_eq!(parse_retry_after("1.5"), None);
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn retry_after_is_clamped() {
        assert_eq!(parse_retry_after("60"), Some(Duration::from_secs(60)));
        assert_eq!(parse_retry_after("61"), Some(Duration::from_secs(60)));
        assert_eq!(parse_retry_after("999999999"), Some(Duration::from_secs(60)));
        assert_eq!(
            parse_retry_after("18446744073709551615"),
            Some(Duration::from_secs(MAX_RETRY_AFTER_SECS))
        );
    }

    #[test]
    fn status_delay_prefers_retry_after() {
        assert_eq!(status_retry_delay(Some("7"), 0), Duration::from_secs(7));
        assert_eq!(status_retry_delay(Some("soon"), 1), Duration::from_secs(2));
        assert_eq!(status_retry_delay(None, 2), Duration::from_secs(4));
    }
}
