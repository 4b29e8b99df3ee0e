//! Allowlisted, rate-limited, circuit-protected request issuer.
//!
//! Every request passes, in order:
//! 1. URL parse and host extraction (`InvalidTarget`)
//! 2. Allowlist gate (`AllowlistRejected`, no state touched)
//! 3. Per-host circuit check (`CircuitOpen`)
//! 4. Per-host token bucket (waits, never spins)
//! 5. One transport attempt, then retry policy
//!
//! Steps 3-5 repeat for each retry attempt.

use crate::client::http::{ReqwestTransport, RequestDescriptor, ResponseDescriptor, Transport};
use crate::clock::{Clock, SystemClock};
use crate::config::{Allowlist, ClientConfig};
use crate::meter::backoff::{exponential_backoff, is_retryable_status, status_retry_delay};
use crate::meter::breaker::{BreakerState, CircuitBreaker};
use crate::meter::bucket::TokenBucket;
use crate::AuditError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::Instant;
use url::{Host, Url};

/// Mutable protection state for one destination host.
#[derive(Debug)]
struct HostState {
    bucket: TokenBucket,
    breaker: CircuitBreaker,
}

/// HTTP client that protects destination hosts and refuses unlisted ones.
///
/// Create one instance and share it; per-host state lives as long as the
/// client does.
pub struct SafeHttpClient {
    config: ClientConfig,
    allowlist: Allowlist,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    hosts: Mutex<HashMap<String, HostState>>,
}

impl SafeHttpClient {
    /// Create a client over the default reqwest transport.
    ///
    /// # Errors
    /// Returns an error if configuration validation or HTTP client creation fails.
    pub fn new(config: ClientConfig, allowlist: Allowlist) -> Result<Self, AuditError> {
        config.validate()?;
        let transport = ReqwestTransport::new(config.user_agent.clone())?;
        Self::with_transport(config, allowlist, Arc::new(transport))
    }

    /// Create a client over a caller-supplied transport.
    pub fn with_transport(
        config: ClientConfig,
        allowlist: Allowlist,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, AuditError> {
        config.validate()?;
        Ok(Self {
            config,
            allowlist,
            transport,
            clock: Arc::new(SystemClock),
            hosts: Mutex::new(HashMap::new()),
        })
    }

    /// Replace the clock used for bucket and breaker timing.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// GET `url` through [`request`](Self::request).
    pub async fn get(&self, url: &str) -> Result<ResponseDescriptor, AuditError> {
        self.request(&RequestDescriptor::get(url)).await
    }

    /// Issue a request with allowlist, circuit, rate-limit and retry protection.
    ///
    /// 429 and 5xx responses are retried; once the budget is spent the last
    /// such response is returned as `Ok`. Transport failures are retried the
    /// same way but the last error is returned as `Err`.
    ///
    /// # Errors
    /// - `InvalidTarget` - URL is not an absolute http(s) URL with a host
    /// - `AllowlistRejected` - Host is not allowlisted
    /// - `CircuitOpen` - Host breaker is open
    /// - `Transport` - Every attempt failed to produce a response
    pub async fn request(
        &self,
        request: &RequestDescriptor,
    ) -> Result<ResponseDescriptor, AuditError> {
        let host = target_host(&request.url)?;

        if !self.allowlist.permits(&host) {
            tracing::warn!(host = %host, "Refusing request to host outside allowlist");
            return Err(AuditError::AllowlistRejected { host });
        }

        let max_retries = self.config.max_retries;
        let mut attempt: u32 = 0;

        loop {
            self.ensure_closed(&host)?;
            self.acquire(&host).await;

            tracing::debug!(host = %host, url = %request.url, attempt, "Sending request");

            let delay = match self.transport.send(request, self.config.timeout).await {
                Ok(response) if is_retryable_status(response.status) => {
                    if attempt >= max_retries {
                        self.record_failure(&host);
                        tracing::warn!(
                            host = %host,
                            status = response.status,
                            attempts = attempt + 1,
                            "Retries exhausted, returning last response"
                        );
                        return Ok(response);
                    }
                    let retry_after = response.header("retry-after");
                    status_retry_delay(retry_after.as_deref(), attempt)
                }
                Ok(response) => {
                    self.record_success(&host);
                    return Ok(response);
                }
                Err(err) => {
                    self.record_failure(&host);
                    if attempt >= max_retries {
                        tracing::warn!(
                            host = %host,
                            attempts = attempt + 1,
                            error = %err,
                            "Retries exhausted after transport failures"
                        );
                        return Err(err);
                    }
                    tracing::debug!(host = %host, error = %err, "Transport failure");
                    exponential_backoff(attempt)
                }
            };

            tracing::info!(
                host = %host,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "Retrying request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Breaker state for `host`. Hosts never contacted are closed.
    pub fn breaker_state(&self, host: &str) -> BreakerState {
        let now = self.clock.now();
        self.lock_hosts()
            .get(&host.to_ascii_lowercase())
            .map(|s| s.breaker.state(now))
            .unwrap_or(BreakerState::Closed)
    }

    /// Consecutive failures recorded against `host`.
    pub fn host_failures(&self, host: &str) -> u32 {
        self.lock_hosts()
            .get(&host.to_ascii_lowercase())
            .map(|s| s.breaker.failures())
            .unwrap_or(0)
    }

    fn lock_hosts(&self) -> MutexGuard<'_, HashMap<String, HostState>> {
        self.hosts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_host<R>(&self, host: &str, f: impl FnOnce(&mut HostState, Instant) -> R) -> R {
        let now = self.clock.now();
        let mut hosts = self.lock_hosts();
        let state = hosts.entry(host.to_string()).or_insert_with(|| HostState {
            bucket: TokenBucket::new(self.config.burst, self.config.requests_per_second, now),
            breaker: CircuitBreaker::new(self.config.failure_threshold, self.config.cooldown),
        });
        f(state, now)
    }

    fn ensure_closed(&self, host: &str) -> Result<(), AuditError> {
        self.with_host(host, |state, now| state.breaker.ensure_closed(now))
            .map_err(|retry_in| {
                tracing::warn!(
                    host = %host,
                    retry_in_ms = retry_in.as_millis() as u64,
                    "Circuit open, failing fast"
                );
                AuditError::CircuitOpen {
                    host: host.to_string(),
                    retry_in,
                }
            })
    }

    async fn acquire(&self, host: &str) {
        loop {
            let wait = match self.with_host(host, |state, now| state.bucket.try_acquire(now)) {
                Ok(()) => return,
                Err(wait) => wait,
            };
            tracing::trace!(host = %host, wait_us = wait.as_micros() as u64, "Rate limited");
            tokio::time::sleep(wait).await;
        }
    }

    fn record_failure(&self, host: &str) {
        let opened = self.with_host(host, |state, now| state.breaker.record_failure(now));
        if opened {
            tracing::warn!(
                host = %host,
                cooldown_ms = self.config.cooldown.as_millis() as u64,
                "Circuit opened"
            );
        }
    }

    fn record_success(&self, host: &str) {
        self.with_host(host, |state, _| state.breaker.record_success());
    }
}

impl std::fmt::Debug for SafeHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeHttpClient")
            .field("config", &self.config)
            .field("allowlist", &self.allowlist)
            .field("hosts", &self.lock_hosts().len())
            .finish()
    }
}

/// Extract the per-host state key from an absolute http(s) URL.
///
/// Domains are lowercased. IPv6 literals are returned without brackets,
/// so `http://[::1]/` yields `::1`.
pub fn target_host(url: &str) -> Result<String, AuditError> {
    let invalid = |reason: String| AuditError::InvalidTarget {
        url: url.to_string(),
        reason,
    };

    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
    }
    match parsed.host() {
        Some(Host::Domain(domain)) if !domain.is_empty() => Ok(domain.to_ascii_lowercase()),
        Some(Host::Ipv4(addr)) => Ok(addr.to_string()),
        Some(Host::Ipv6(addr)) => Ok(addr.to_string()),
        _ => Err(invalid("URL has no host".to_string())),
    }
}
