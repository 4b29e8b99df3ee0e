//! # Headerwarden
//!
//! **Rate-limited, circuit-protected HTTP security header auditing.**
//!
//! Headerwarden fetches allowlisted URLs and grades their response headers
//! against a fixed ruleset of eight security headers, emitting one structured
//! record per finding plus a scored summary.
//!
//! ## Features
//!
//! - **Allowlist gate**: hosts not explicitly permitted are refused before any I/O
//! - **Per-host token bucket**: bursts capped, long-run rate enforced without spinning
//! - **Per-host circuit breaker**: repeated failures fail fast for a cooldown
//! - **Bounded retries**: 429/5xx and transport errors retried with capped backoff
//! - **Deterministic grading**: evaluation is a pure function of the headers
//!
//! ## Quickstart
//!
//! ```no_run
//! use headerwarden::{Allowlist, ClientConfig, HeaderAuditor, JsonlSink, SafeHttpClient};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), headerwarden::AuditError> {
//! let client = SafeHttpClient::new(ClientConfig::default(), Allowlist::parse("staging.example.com"))?;
//! let auditor = HeaderAuditor::new(Arc::new(client), Arc::new(JsonlSink::stdout()));
//!
//! let report = auditor.audit("https://staging.example.com/").await?;
//! println!("score: {}", report.summary.score);
//! # Ok(())
//! # }
//! ```
//!
//! ## Scoring
//!
//! Start at 100; subtract 30 for each failing `high` rule
//! (Strict-Transport-Security, Content-Security-Policy) and 10 for each
//! failing `medium` rule. The score is not clamped and can go negative.

#![deny(warnings)]
#![deny(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Metering layer
pub mod meter;

// Client layer
pub mod client;

// Policy layer
pub mod policy;

// Structured output
pub mod events;

// Auditor (main public API)
pub mod auditor;

// Re-exports for public API
pub use auditor::{AuditReport, HeaderAuditor};
pub use client::{RequestDescriptor, ResponseDescriptor, SafeHttpClient, Transport};
pub use clock::{Clock, SystemClock};
pub use config::{Allowlist, ClientConfig, ALLOWLIST_ENV};
pub use errors::AuditError;
pub use events::{AuditEvent, AuditSummary, EventRecord, EventSink, JsonlSink, MemorySink};
pub use meter::breaker::BreakerState;
pub use policy::evaluate::{evaluate, normalize_headers, Evaluation, Finding};
pub use policy::rules::{HeaderRule, Severity, RULES};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
