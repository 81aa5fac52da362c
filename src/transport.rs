//! The HTTP transport seam.
//!
//! The network manager only needs "send this request, give me the status and
//! the body". [`Transport`] captures that contract so tests can script server
//! behaviour, and [`ReqwestTransport`] is the production implementation.

use crate::error::{Error, Result, TransportError};
use crate::request::HttpRequest;
use async_trait::async_trait;
use std::time::{Duration, Instant};

/// The raw result of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpOutcome {
    /// The status code as reported by the transport.
    pub status: u16,
    /// The response body.
    pub body: Vec<u8>,
}

impl HttpOutcome {
    /// Creates an outcome from a status and body.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Sends HTTP requests.
///
/// Implementations return `Ok` for every response the server produced,
/// whatever its status. `Err` is reserved for requests that never got an
/// answer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Executes one request.
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpOutcome, TransportError>;
}

/// [`Transport`] backed by a pooled `reqwest::Client`.
///
/// # Examples
///
/// ```no_run
/// use newbcook_sdk::ReqwestTransport;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), newbcook_sdk::Error> {
/// let transport = ReqwestTransport::builder()
///     .connect_timeout(Duration::from_secs(3))
///     .user_agent("newbcook/1.0")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Creates a builder for configuring the underlying client.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// Wraps an already configured `reqwest::Client`.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpOutcome, TransportError> {
        let start_time = Instant::now();

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            timeout_ms = request.timeout.as_millis(),
            "Executing HTTP request"
        );

        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .timeout(request.timeout);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        tracing::debug!(
            status = status.as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "Received HTTP response"
        );

        Ok(HttpOutcome {
            status: status.as_u16(),
            body: body.to_vec(),
        })
    }
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug, Default)]
pub struct ReqwestTransportBuilder {
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl ReqwestTransportBuilder {
    /// Sets the TCP connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the User-Agent header sent with every request.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Builds the transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if the client cannot be built.
    pub fn build(self) -> Result<ReqwestTransport> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(user_agent) = self.user_agent {
            builder = builder.user_agent(user_agent);
        }

        let client = builder.build().map_err(|e| {
            Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(ReqwestTransport { client })
    }
}
