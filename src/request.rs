//! Request construction.
//!
//! [`RequestBuilder`] turns an [`Endpoint`] plus a hostname and bearer token
//! into an [`HttpRequest`]: plain data that any [`Transport`](crate::Transport)
//! can execute. Building never touches the network or the credential store,
//! so the same inputs always produce the same request.

use crate::endpoint::Endpoint;
use crate::error::BuildError;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method};
use std::time::Duration;
use url::Url;

/// Default timeout for business calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default timeout for the login call.
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(15);

/// A fully formed HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// The HTTP method.
    pub method: Method,
    /// Absolute URL including any query parameters.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// JSON body, if any.
    pub body: Option<Vec<u8>>,
    /// How long the transport may wait for the response.
    pub timeout: Duration,
}

impl HttpRequest {
    /// Returns a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Returns the URL path without the leading slash.
    pub fn path(&self) -> &str {
        self.url.path().trim_start_matches('/')
    }

    /// Returns the body parsed as JSON, if there is one.
    pub fn json_body(&self) -> Option<serde_json::Value> {
        self.body
            .as_deref()
            .and_then(|body| serde_json::from_slice(body).ok())
    }
}

/// Builds [`HttpRequest`]s from endpoint descriptors.
///
/// # Examples
///
/// ```
/// use newbcook_sdk::{Endpoint, RequestBuilder};
/// use std::time::Duration;
///
/// let request = RequestBuilder::new()
///     .build(&Endpoint::login("alice", "secret"), "api.example.com", None)
///     .unwrap();
///
/// assert_eq!(request.url.as_str(), "http://api.example.com/login");
/// assert_eq!(request.timeout, Duration::from_secs(15));
/// assert!(request.header("authorization").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    scheme: String,
    default_timeout: Duration,
    login_timeout: Duration,
}

impl RequestBuilder {
    /// Creates a builder using `http`, a 5s default timeout and a 15s login timeout.
    pub fn new() -> Self {
        Self {
            scheme: "http".to_string(),
            default_timeout: DEFAULT_TIMEOUT,
            login_timeout: LOGIN_TIMEOUT,
        }
    }

    /// Sets the URL scheme used for bare hostnames.
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Sets the timeout for business calls.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Sets the timeout for the login call.
    pub fn login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// Returns the configured scheme.
    pub fn scheme_name(&self) -> &str {
        &self.scheme
    }

    /// Builds the request for `endpoint` against `hostname`.
    ///
    /// `bearer` is the token placed in the Authorization header. It is ignored
    /// for the login descriptor and required for every other endpoint.
    ///
    /// # Errors
    ///
    /// * [`BuildError::InvalidHost`] if the hostname or path is empty or the URL is invalid
    /// * [`BuildError::MissingCredentials`] if an authenticated endpoint has no bearer token
    /// * [`BuildError::Serialization`] if the body cannot be encoded
    pub fn build(
        &self,
        endpoint: &Endpoint,
        hostname: &str,
        bearer: Option<&str>,
    ) -> Result<HttpRequest, BuildError> {
        let mut url = self.url_for(hostname, endpoint.path())?;

        if endpoint.sends_params_in_query() {
            let pairs = query_pairs(endpoint.payload());
            if !pairs.is_empty() {
                url.query_pairs_mut().extend_pairs(pairs);
            }
        }

        let mut headers = HeaderMap::new();

        if !endpoint.is_login() {
            let token = bearer.ok_or(BuildError::MissingCredentials)?;
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| BuildError::InvalidHeader(e.to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let body = if endpoint.method().carries_body() && !endpoint.payload().is_null() {
            let bytes = serde_json::to_vec(endpoint.payload())
                .map_err(|e| BuildError::Serialization(e.to_string()))?;
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            Some(bytes)
        } else {
            None
        };

        let timeout = endpoint.timeout().unwrap_or(if endpoint.is_login() {
            self.login_timeout
        } else {
            self.default_timeout
        });

        Ok(HttpRequest {
            method: endpoint.method().into(),
            url,
            headers,
            body,
            timeout,
        })
    }

    fn url_for(&self, hostname: &str, path: &str) -> Result<Url, BuildError> {
        let hostname = hostname.trim().trim_end_matches('/');
        let path = path.trim_start_matches('/');

        if hostname.is_empty() {
            return Err(BuildError::InvalidHost("hostname cannot be empty".to_string()));
        }
        if path.is_empty() {
            return Err(BuildError::InvalidHost("endpoint path cannot be empty".to_string()));
        }

        let raw = if hostname.contains("://") {
            format!("{}/{}", hostname, path)
        } else {
            format!("{}://{}/{}", self.scheme, hostname, path)
        };

        Url::parse(&raw).map_err(|e| BuildError::InvalidHost(format!("{}: {}", raw, e)))
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Flattens the scalar fields of a JSON object into query pairs.
///
/// Nested objects, arrays and nulls cannot be expressed as a single query
/// value and are skipped.
fn query_pairs(payload: &serde_json::Value) -> Vec<(String, String)> {
    let Some(object) = payload.as_object() else {
        return Vec::new();
    };

    let mut pairs: Vec<(String, String)> = object
        .iter()
        .filter_map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key.clone(), value))
        })
        .collect();
    pairs.sort();
    pairs
}
