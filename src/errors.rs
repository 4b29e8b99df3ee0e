//! Headerwarden error types.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while issuing requests or auditing a target.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Target URL does not parse to an absolute URL with a host.
    #[error("Invalid target '{url}': {reason}")]
    InvalidTarget {
        /// The URL as supplied by the caller.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Target host is not on the allowlist. No network activity occurred.
    #[error("Refusing to contact '{host}': host is not allowlisted (add it to {var} to permit requests)", var = crate::config::ALLOWLIST_ENV)]
    AllowlistRejected {
        /// The rejected host.
        host: String,
    },

    /// The circuit breaker for this host is open.
    #[error("Circuit open for '{host}', retry in {}ms", .retry_in.as_millis())]
    CircuitOpen {
        /// Host whose breaker tripped.
        host: String,
        /// Remaining cooldown.
        retry_in: Duration,
    },

    /// Connection, DNS, TLS or timeout failure after all retries.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Structured event sink failed to record.
    #[error("Event sink error: {0}")]
    Sink(String),
}

impl AuditError {
    /// Short machine-readable discriminator, used in `audit.error` records.
    pub fn kind(&self) -> &'static str {
        match self {
            AuditError::ConfigError(_) => "config",
            AuditError::InvalidTarget { .. } => "invalid_target",
            AuditError::AllowlistRejected { .. } => "allowlist_rejected",
            AuditError::CircuitOpen { .. } => "circuit_open",
            AuditError::Transport(_) => "transport",
            AuditError::Sink(_) => "sink",
        }
    }
}
