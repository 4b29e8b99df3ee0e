//! Header Auditor - the main public API for Headerwarden.
//!
//! The `HeaderAuditor` fetches a URL once through a [`SafeHttpClient`],
//! grades the response headers against the fixed ruleset, and reports every
//! step to an [`EventSink`].

use crate::client::{ResponseDescriptor, SafeHttpClient};
use crate::clock::{Clock, SystemClock};
use crate::config::{Allowlist, ClientConfig};
use crate::events::{AuditEvent, AuditSummary, EventRecord, EventSink, NullSink};
use crate::policy::evaluate::{evaluate, normalize_headers, Finding, NormalizedHeaders};
use crate::AuditError;
use std::sync::Arc;

/// Everything produced by one audit.
#[derive(Debug, Clone)]
pub struct AuditReport {
    /// Raw response.
    pub response: ResponseDescriptor,
    /// Lowercase names, comma-joined values.
    pub headers: NormalizedHeaders,
    /// One finding per rule.
    pub findings: Vec<Finding>,
    /// Grade and failing header lists.
    pub summary: AuditSummary,
}

/// Grades security headers of allowlisted targets.
///
/// Create one instance per run and reuse it so per-host limits carry over
/// between targets.
pub struct HeaderAuditor {
    client: Arc<SafeHttpClient>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl HeaderAuditor {
    /// Create an auditor over an existing client.
    pub fn new(client: Arc<SafeHttpClient>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            client,
            sink,
            clock: Arc::new(SystemClock),
        }
    }

    /// Create an auditor with a default client for the given allowlist and no sink.
    ///
    /// # Errors
    /// Returns an error if HTTP client creation fails.
    pub fn with_allowlist(allowlist: Allowlist) -> Result<Self, AuditError> {
        let client = SafeHttpClient::new(ClientConfig::default(), allowlist)?;
        Ok(Self::new(Arc::new(client), Arc::new(NullSink)))
    }

    /// Create an auditor with a custom clock for event timestamps (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn new_with_clock(
        client: Arc<SafeHttpClient>,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            sink,
            clock,
        }
    }

    /// The underlying client.
    pub fn client(&self) -> &SafeHttpClient {
        &self.client
    }

    /// Audit one URL.
    ///
    /// This performs:
    /// 1. One GET through the protected client
    /// 2. Header normalization
    /// 3. Rule evaluation and scoring
    /// 4. Emission of `audit.headers`, eight `audit.finding` and one
    ///    `audit.summary` records
    ///
    /// On failure one `audit.error` record is emitted and the client error is
    /// returned unchanged.
    ///
    /// # Errors
    /// - `InvalidTarget` - URL does not parse
    /// - `AllowlistRejected` - Host not allowlisted (no request made)
    /// - `CircuitOpen` - Host breaker open
    /// - `Transport` - Target unreachable after retries
    /// - `Sink` - Event could not be recorded
    pub async fn audit(&self, url: &str) -> Result<AuditReport, AuditError> {
        let response = match self.client.get(url).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "Audit failed");
                self.emit(AuditEvent::error(url, &err))?;
                return Err(err);
            }
        };

        let headers = normalize_headers(response.headers.iter().map(|(n, v)| (n, v)));
        let evaluation = evaluate(&headers);

        let summary = AuditSummary {
            url: url.to_string(),
            status: response.status,
            missing: evaluation.missing,
            invalid: evaluation.invalid,
            score: evaluation.score,
        };

        self.emit(AuditEvent::Headers {
            url: url.to_string(),
            status: response.status,
            headers: headers.clone(),
        })?;
        for finding in &evaluation.findings {
            self.emit(AuditEvent::Finding {
                url: url.to_string(),
                finding: finding.clone(),
            })?;
        }
        self.emit(AuditEvent::summary(summary.clone()))?;

        tracing::info!(
            url = %url,
            status = response.status,
            score = summary.score,
            missing = summary.missing.len(),
            invalid = summary.invalid.len(),
            "Audit complete"
        );

        Ok(AuditReport {
            response,
            headers,
            findings: evaluation.findings,
            summary,
        })
    }

    fn emit(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.sink.record(&EventRecord {
            ts: self.clock.now_utc(),
            event,
        })
    }
}
