//! Headerwarden configuration.

use crate::AuditError;
use std::collections::BTreeSet;
use std::time::Duration;

/// Environment variable holding the comma-separated host allowlist.
pub const ALLOWLIST_ENV: &str = "HEADERWARDEN_ALLOWLIST";

/// Settings for [`SafeHttpClient`](crate::SafeHttpClient).
///
/// Every limit is applied per destination host.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Long-run request rate per host (token refill per second).
    pub requests_per_second: f64,

    /// Maximum burst per host (token bucket capacity).
    pub burst: u32,

    /// Deadline for a single HTTP attempt.
    pub timeout: Duration,

    /// Retries after the first attempt for 429/5xx and transport failures.
    pub max_retries: u32,

    /// Consecutive failures before the host's circuit opens.
    pub failure_threshold: u32,

    /// How long an open circuit refuses requests.
    pub cooldown: Duration,

    /// User-Agent sent with every request.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 2.0,
            burst: 5,
            timeout: Duration::from_millis(15_000),
            max_retries: 3,
            failure_threshold: 6,
            cooldown: Duration::from_millis(60_000),
            user_agent: format!("headerwarden/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Sets the per-host request rate.
    pub fn with_requests_per_second(mut self, rps: f64) -> Self {
        self.requests_per_second = rps;
        self
    }

    /// Sets the per-host burst capacity.
    pub fn with_burst(mut self, burst: u32) -> Self {
        self.burst = burst;
        self
    }

    /// Sets the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry budget.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the breaker failure threshold.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets the breaker cooldown.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), AuditError> {
        if !(self.requests_per_second.is_finite() && self.requests_per_second > 0.0) {
            return Err(AuditError::ConfigError(format!(
                "requests_per_second must be positive, got {}",
                self.requests_per_second
            )));
        }
        if self.burst == 0 {
            return Err(AuditError::ConfigError(
                "burst must be at least 1".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(AuditError::ConfigError(
                "timeout cannot be zero".to_string(),
            ));
        }
        if self.failure_threshold == 0 {
            return Err(AuditError::ConfigError(
                "failure_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Set of hostnames the client is permitted to contact.
///
/// Anything not listed is refused before any network activity. An empty
/// allowlist refuses everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allowlist {
    hosts: BTreeSet<String>,
}

impl Allowlist {
    /// Parse a comma-separated host list. Entries are trimmed and lowercased;
    /// blanks are ignored. IPv6 literals may be written with or without
    /// brackets.
    pub fn parse(list: &str) -> Self {
        let hosts = list
            .split(',')
            .map(|h| {
                let h = h.trim();
                h.strip_prefix('[')
                    .and_then(|inner| inner.strip_suffix(']'))
                    .unwrap_or(h)
                    .to_ascii_lowercase()
            })
            .filter(|h| !h.is_empty())
            .collect();
        Self { hosts }
    }

    /// Load from [`ALLOWLIST_ENV`]. Unset means an empty allowlist.
    pub fn from_env() -> Self {
        match std::env::var(ALLOWLIST_ENV) {
            Ok(list) => Self::parse(&list),
            Err(_) => Self::default(),
        }
    }

    /// Whether `host` may be contacted.
    pub fn permits(&self, host: &str) -> bool {
        self.hosts.contains(&host.to_ascii_lowercase())
    }

    /// Number of permitted hosts.
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// True when nothing is permitted.
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Allowlist {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let hosts = iter
            .into_iter()
            .map(|h| h.as_ref().trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        Self { hosts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_limits() {
        let config = ClientConfig::default();
        assert_eq!(config.requests_per_second, 2.0);
        assert_eq!(config.burst, 5);
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.failure_threshold, 6);
        assert_eq!(config.cooldown, Duration::from_secs(60));
        assert!(config.user_agent.starts_with("headerwarden/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_burst() {
        let config = ClientConfig::default().with_burst(0);
        assert!(matches!(config.validate(), Err(AuditError::ConfigError(_))));
    }

    #[test]
    fn validate_rejects_non_positive_rate() {
        let config = ClientConfig::default().with_requests_per_second(0.0);
        assert!(matches!(config.validate(), Err(AuditError::ConfigError(_))));

        let config = ClientConfig::default().with_requests_per_second(f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout_and_threshold() {
        assert!(ClientConfig::default()
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(ClientConfig::default()
            .with_failure_threshold(0)
            .validate()
            .is_err());
    }

    #[test]
    fn allowlist_parse_trims_and_lowercases() {
        let list = Allowlist::parse(" Staging.Example.com, ,localhost,");
        assert_eq!(list.len(), 2);
        assert!(list.permits("staging.example.com"));
        assert!(list.permits("STAGING.example.COM"));
        assert!(list.permits("localhost"));
        assert!(!list.permits("example.com"));
    }

    #[test]
    fn allowlist_ipv6_entries_drop_brackets() {
        let list = Allowlist::parse("[::1], 2001:DB8::1");
        assert!(list.permits("::1"));
        assert!(list.permits("2001:db8::1"));
        assert!(!list.permits("[::1]"));
    }

    #[test]
    fn empty_allowlist_permits_nothing() {
        let list = Allowlist::parse("");
        assert!(list.is_empty());
        assert!(!list.permits("localhost"));
    }

    #[test]
    fn allowlist_from_iterator() {
        let list: Allowlist = ["a.test", "B.test"].into_iter().collect();
        assert!(list.permits("b.test"));
        assert_eq!(list.len(), 2);
    }
}
