//! Headerwarden CLI.
//!
//! ```text
//! HEADERWARDEN_ALLOWLIST=staging.example.com headerwarden headers https://staging.example.com/
//! ```
//!
//! Stdout carries only JSON Lines records. Logs and the final tally go to
//! stderr.

use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use headerwarden::{
    AuditError, Allowlist, ClientConfig, HeaderAuditor, JsonlSink, SafeHttpClient, ALLOWLIST_ENV,
};
use std::fmt;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "headerwarden", version)]
#[command(about = "Audit HTTP security headers of allowlisted hosts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch each URL once and grade its security headers
    Headers(HeadersArgs),
}

#[derive(Args)]
struct HeadersArgs {
    /// Target URLs, audited in order
    #[arg(required = true)]
    urls: Vec<String>,

    /// Requests per second per host
    #[arg(long, default_value_t = 2.0)]
    rps: f64,

    /// Burst capacity per host
    #[arg(long, default_value_t = 5)]
    burst: u32,

    /// Per-attempt timeout in milliseconds
    #[arg(long = "timeout-ms", default_value_t = 15_000)]
    timeout_ms: u64,

    /// Retries for 429/5xx and transport failures
    #[arg(long, default_value_t = 3)]
    retries: u32,
}

impl HeadersArgs {
    fn client_config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_requests_per_second(self.rps)
            .with_burst(self.burst)
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_max_retries(self.retries)
    }
}

/// Run totals reported on stderr.
#[derive(Debug, Default)]
struct Tally {
    targets: usize,
    scores: Vec<i32>,
}

impl Tally {
    fn succeeded(&mut self, score: i32) {
        self.targets += 1;
        self.scores.push(score);
    }

    fn failed(&mut self) {
        self.targets += 1;
    }

    fn average_score(&self) -> Option<f64> {
        if self.scores.is_empty() {
            return None;
        }
        let total: i64 = self.scores.iter().map(|s| i64::from(*s)).sum();
        Some(total as f64 / self.scores.len() as f64)
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "targets={} succeeded={}", self.targets, self.scores.len())?;
        match self.average_score() {
            Some(avg) => write!(f, " average_score={:.1}", avg),
            None => write!(f, " average_score=n/a"),
        }
    }
}

async fn run_headers(args: HeadersArgs) -> Result<Tally, AuditError> {
    let allowlist = Allowlist::from_env();
    if allowlist.is_empty() {
        tracing::warn!(var = ALLOWLIST_ENV, "Allowlist is empty; every target will be refused");
    }

    let client = SafeHttpClient::new(args.client_config(), allowlist)?;
    let auditor = HeaderAuditor::new(Arc::new(client), Arc::new(JsonlSink::stdout()));
    audit_batch(&auditor, &args.urls).await
}

/// Audit `urls` in order. Per-target failures are tallied; only a sink
/// failure ends the batch.
async fn audit_batch(auditor: &HeaderAuditor, urls: &[String]) -> Result<Tally, AuditError> {
    let mut tally = Tally::default();
    for url in urls {
        match auditor.audit(url).await {
            Ok(report) => tally.succeeded(report.summary.score),
            // Stdout is gone; nothing further can be reported.
            Err(err @ AuditError::Sink(_)) => return Err(err),
            Err(_) => tally.failed(),
        }
    }
    Ok(tally)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "headerwarden=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    match cli.command {
        Commands::Headers(args) => match run_headers(args).await {
            Ok(tally) => {
                eprintln!("{}", tally);
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!(error = %e, "Fatal error");
                eprintln!("headerwarden: {}", e);
                ExitCode::from(1)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use headerwarden::{
        EventRecord, EventSink, MemorySink, RequestDescriptor, ResponseDescriptor, Transport,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Always answers 200 with a single passing header.
    #[derive(Default)]
    struct OkTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for OkTransport {
        async fn send(
            &self,
            _request: &RequestDescriptor,
            _timeout: Duration,
        ) -> Result<ResponseDescriptor, AuditError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ResponseDescriptor::new(200, [("X-Frame-Options", "DENY")]))
        }
    }

    /// Stands in for a closed stdout.
    struct BrokenSink;

    impl EventSink for BrokenSink {
        fn record(&self, _record: &EventRecord) -> Result<(), AuditError> {
            Err(AuditError::Sink("Broken pipe".to_string()))
        }
    }

    fn auditor(transport: Arc<OkTransport>, sink: Arc<dyn EventSink>) -> HeaderAuditor {
        let client = SafeHttpClient::with_transport(
            ClientConfig::default(),
            Allowlist::parse("staging.test"),
            transport,
        )
        .unwrap();
        HeaderAuditor::new(Arc::new(client), sink)
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|u| u.to_string()).collect()
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_headers_command() {
        let cli = Cli::try_parse_from([
            "headerwarden",
            "headers",
            "https://a.test/",
            "https://b.test/",
            "--burst",
            "2",
        ])
        .unwrap();
        let Commands::Headers(args) = cli.command;
        assert_eq!(args.urls.len(), 2);
        let config = args.client_config();
        assert_eq!(config.burst, 2);
        assert_eq!(config.requests_per_second, 2.0);
        assert_eq!(config.timeout, Duration::from_secs(15));
    }

    #[test]
    fn missing_urls_or_command_is_an_error() {
        assert!(Cli::try_parse_from(["headerwarden", "headers"]).is_err());
        assert!(Cli::try_parse_from(["headerwarden"]).is_err());
        assert!(Cli::try_parse_from(["headerwarden", "scan", "https://a.test/"]).is_err());
    }

    #[tokio::test]
    async fn batch_keeps_going_past_failed_targets() {
        let transport = Arc::new(OkTransport::default());
        let sink = Arc::new(MemorySink::new());
        let auditor = auditor(transport.clone(), sink.clone());

        let targets = urls(&[
            "https://prod.test/",
            "https://staging.test/",
            "not a url",
            "https://staging.test/login",
        ]);
        let tally = audit_batch(&auditor, &targets).await.unwrap();

        assert_eq!(tally.targets, 4);
        assert_eq!(tally.scores, vec![-10, -10]);
        assert_eq!(tally.to_string(), "targets=4 succeeded=2 average_score=-10.0");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);

        let types = sink.types();
        assert_eq!(types.iter().filter(|t| **t == "audit.error").count(), 2);
        assert_eq!(types.iter().filter(|t| **t == "audit.summary").count(), 2);
    }

    #[tokio::test]
    async fn batch_of_only_refused_targets_still_succeeds() {
        let transport = Arc::new(OkTransport::default());
        let sink = Arc::new(MemorySink::new());
        let auditor = auditor(transport.clone(), sink.clone());

        let tally = audit_batch(&auditor, &urls(&["https://a.test/", "https://b.test/"]))
            .await
            .unwrap();

        assert_eq!(tally.to_string(), "targets=2 succeeded=0 average_score=n/a");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.types(), vec!["audit.error", "audit.error"]);
    }

    #[tokio::test]
    async fn sink_failure_ends_the_batch() {
        let transport = Arc::new(OkTransport::default());
        let auditor = auditor(transport.clone(), Arc::new(BrokenSink));

        let err = audit_batch(
            &auditor,
            &urls(&["https://staging.test/", "https://staging.test/next"]),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AuditError::Sink(_)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tally_formatting() {
        let mut tally = Tally::default();
        assert_eq!(tally.to_string(), "targets=0 succeeded=0 average_score=n/a");

        tally.succeeded(100);
        tally.succeeded(-20);
        tally.failed();
        assert_eq!(tally.to_string(), "targets=3 succeeded=2 average_score=40.0");
    }
}
