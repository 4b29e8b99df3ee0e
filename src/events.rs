//! Structured audit records and the sinks that persist them.
//!
//! Every record serializes to one JSON object with an ISO-8601 `ts` and a
//! `type` discriminator (`audit.headers`, `audit.finding`, `audit.summary`,
//! `audit.error`).

use crate::policy::evaluate::{Finding, NormalizedHeaders};
use crate::AuditError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;

/// Outcome of auditing one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    /// Audited URL.
    pub url: String,
    /// Response status code.
    pub status: u16,
    /// Headers that were not sent.
    pub missing: Vec<&'static str>,
    /// Headers sent with a failing value.
    pub invalid: Vec<&'static str>,
    /// Grade, not clamped at zero.
    pub score: i32,
}

/// Event payload, tagged by `type`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum AuditEvent {
    /// Normalized response headers as received.
    #[serde(rename = "audit.headers")]
    Headers {
        /// Audited URL.
        url: String,
        /// Response status code.
        status: u16,
        /// Lowercase names, comma-joined values.
        headers: NormalizedHeaders,
    },

    /// One rule's verdict.
    #[serde(rename = "audit.finding")]
    Finding {
        /// Audited URL.
        url: String,
        /// The finding.
        #[serde(flatten)]
        finding: Finding,
    },

    /// Per-URL grade.
    #[serde(rename = "audit.summary")]
    Summary {
        /// Always true.
        ok: bool,
        /// The summary.
        #[serde(flatten)]
        summary: AuditSummary,
    },

    /// Audit of a URL failed before evaluation.
    #[serde(rename = "audit.error")]
    Error {
        /// Always false.
        ok: bool,
        /// Target as supplied.
        url: String,
        /// Error category.
        kind: &'static str,
        /// Human-readable error.
        error: String,
    },
}

impl AuditEvent {
    /// Build an `audit.error` event from an error.
    pub fn error(url: &str, error: &AuditError) -> Self {
        AuditEvent::Error {
            ok: false,
            url: url.to_string(),
            kind: error.kind(),
            error: error.to_string(),
        }
    }

    /// Build an `audit.summary` event.
    pub fn summary(summary: AuditSummary) -> Self {
        AuditEvent::Summary { ok: true, summary }
    }

    /// The `type` discriminator.
    pub fn type_name(&self) -> &'static str {
        match self {
            AuditEvent::Headers { .. } => "audit.headers",
            AuditEvent::Finding { .. } => "audit.finding",
            AuditEvent::Summary { .. } => "audit.summary",
            AuditEvent::Error { .. } => "audit.error",
        }
    }
}

/// Timestamped event as written to a sink.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    /// When the event was produced.
    pub ts: DateTime<Utc>,
    /// The payload; its fields are inlined next to `ts`.
    #[serde(flatten)]
    pub event: AuditEvent,
}

impl EventRecord {
    /// Serialize as a single JSON line (no trailing newline).
    pub fn to_json_line(&self) -> Result<String, AuditError> {
        serde_json::to_string(self)
            .map_err(|e| AuditError::Sink(format!("Failed to serialize record: {}", e)))
    }
}

/// Accepts structured records.
pub trait EventSink: Send + Sync {
    /// Record one event.
    fn record(&self, record: &EventRecord) -> Result<(), AuditError>;
}

/// Writes one JSON object per line, flushing after each record.
pub struct JsonlSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonlSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl JsonlSink<std::io::Stdout> {
    /// Sink writing to standard output.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> EventSink for JsonlSink<W> {
    fn record(&self, record: &EventRecord) -> Result<(), AuditError> {
        let line = record.to_json_line()?;
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(writer, "{}", line)
            .and_then(|_| writer.flush())
            .map_err(|e| AuditError::Sink(format!("Failed to write record: {}", e)))
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<EventRecord>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events.
    pub fn records(&self) -> Vec<EventRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// `type` discriminators in recording order.
    pub fn types(&self) -> Vec<&'static str> {
        self.records().iter().map(|r| r.event.type_name()).collect()
    }
}

impl EventSink for MemorySink {
    fn record(&self, record: &EventRecord) -> Result<(), AuditError> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record.clone());
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _record: &EventRecord) -> Result<(), AuditError> {
        Ok(())
    }
}
