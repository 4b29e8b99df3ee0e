//! Reqwest-based HTTP transport.
//!
//! This module issues single HTTP attempts and captures status, every header
//! instance in arrival order, and optionally the body. Policy (allowlist,
//! rate limiting, retries) lives in [`SafeHttpClient`](super::SafeHttpClient).
//!
//! Redirects are never followed. A 3xx response is returned and graded as is,
//! so a permitted host cannot hand the tool off to one the allowlist refuses.

use crate::AuditError;
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::redirect::Policy;
use reqwest::{Client, Method};
use std::time::Duration;

/// Outbound request description.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// Absolute target URL.
    pub url: String,

    /// HTTP method.
    pub method: Method,

    /// Extra request headers.
    pub headers: Vec<(String, String)>,

    /// Optional request body.
    pub body: Option<Vec<u8>>,
}

impl RequestDescriptor {
    /// A bodiless GET.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Add a request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a body.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }
}

/// HTTP response with captured headers and body.
#[derive(Debug, Clone, Default)]
pub struct ResponseDescriptor {
    /// HTTP status code.
    pub status: u16,

    /// Header instances as received. Names keep their wire casing.
    pub headers: Vec<(String, String)>,

    /// Response body, when the transport retains it.
    pub body: Option<Vec<u8>>,
}

impl ResponseDescriptor {
    /// Build a response from a status and header pairs (no body).
    pub fn new<N, V>(status: u16, headers: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Self {
            status,
            headers: headers
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
            body: None,
        }
    }

    /// Case-insensitive header lookup. Repeated instances are joined with `", "`.
    pub fn header(&self, name: &str) -> Option<String> {
        let values: Vec<&str> = self
            .headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect();

        if values.is_empty() {
            None
        } else {
            Some(values.join(", "))
        }
    }

    /// Body as UTF-8, if retained and valid.
    pub fn body_str(&self) -> Option<&str> {
        self.body
            .as_deref()
            .and_then(|b| std::str::from_utf8(b).ok())
    }
}

/// A single HTTP attempt.
///
/// Implementations must not retry and must not treat non-2xx statuses as
/// errors; only failures to obtain a response are `Err`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one request bounded by `timeout`.
    async fn send(
        &self,
        request: &RequestDescriptor,
        timeout: Duration,
    ) -> Result<ResponseDescriptor, AuditError>;
}

/// Default transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    user_agent: String,
    retain_body: bool,
}

impl ReqwestTransport {
    /// Create a transport sending the given User-Agent.
    ///
    /// # Errors
    /// Returns `ConfigError` if the underlying HTTP client cannot be built.
    pub fn new(user_agent: impl Into<String>) -> Result<Self, AuditError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .build()
            .map_err(|e| AuditError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            user_agent: user_agent.into(),
            retain_body: false,
        })
    }

    /// Keep response bodies instead of discarding them.
    pub fn with_body_retention(mut self, retain: bool) -> Self {
        self.retain_body = retain;
        self
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &RequestDescriptor,
        timeout: Duration,
    ) -> Result<ResponseDescriptor, AuditError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .timeout(timeout)
            .header(USER_AGENT, &self.user_agent);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AuditError::Transport(format!("Request to {} failed: {}", request.url, e)))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = if self.retain_body {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| AuditError::Transport(format!("Failed to read body: {}", e)))?;
            Some(bytes.to_vec())
        } else {
            None
        };

        Ok(ResponseDescriptor {
            status,
            headers,
            body,
        })
    }
}
