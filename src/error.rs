//! Error types for authenticated calls against the list service.
//!
//! Errors are layered: [`BuildError`] covers requests that could never be
//! sent, [`TransportError`] covers requests that were sent but never answered,
//! and [`Error`] is what callers of the [`NetworkManager`](crate::NetworkManager)
//! see once server responses and token refreshes have been interpreted.
//! Raw status codes and bodies are preserved wherever the server answered.

use crate::classify::Outcome;
use crate::codec::ErrorReason;
use crate::refresh::RefreshError;
use http::StatusCode;

/// The main error type returned by the network manager and the backend API.
///
/// # Examples
///
/// ```no_run
/// use newbcook_sdk::{Endpoint, Error, HttpMethod, NetworkManager};
///
/// # async fn example(manager: NetworkManager) {
/// let endpoint = Endpoint::without_payload(HttpMethod::Get, "retrieve_list_names");
/// match manager.execute::<serde_json::Value>(&endpoint).await {
///     Ok(response) => println!("Lists: {:?}", response.data),
///     Err(Error::AuthInvalid) => println!("Logged out, show the login screen"),
///     Err(Error::HttpError { status, raw_response }) => {
///         eprintln!("HTTP error {}: {}", status, raw_response);
///     }
///     Err(e) => eprintln!("{}", e.user_message()),
/// }
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The request could not be built (bad host, no stored credentials, etc.).
    ///
    /// These are caller bugs or missing login state and are never retried.
    #[error("Failed to build request: {0}")]
    Build(#[from] BuildError),

    /// The request never produced an HTTP response.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The access token was still reported as expired after a successful refresh.
    #[error("Session expired and could not be renewed")]
    AuthExpired,

    /// The server declared the session unrecoverable.
    ///
    /// Stored credentials have already been cleared when this is returned and
    /// the registered [`SessionListener`](crate::SessionListener) has been notified.
    #[error("Session is no longer valid, credentials were cleared")]
    AuthInvalid,

    /// The server rejected the supplied credentials (401 without a session reason).
    #[error("Invalid credentials{}", .reason.map(|r| format!(" ({})", r)).unwrap_or_default())]
    InvalidCredentials {
        /// The reason the server gave, if the error envelope could be parsed.
        reason: Option<ErrorReason>,
    },

    /// Refreshing the access token failed.
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    /// The response body did not match the expected payload shape.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// The server answered with a status the client does not special-case.
    #[error("HTTP error {status}: {raw_response}")]
    HttpError {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
    },

    /// The transport produced something that is not a valid HTTP response.
    #[error("Unprocessable response: {0}")]
    UnprocessableResponse(String),

    /// Invalid configuration was provided to a builder.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// Reasons a request could not be built.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// The hostname or endpoint path is empty or does not form a valid URL.
    #[error("Invalid host: {0}")]
    InvalidHost(String),

    /// An authenticated call was attempted without a stored session.
    #[error("No stored credentials, log in first")]
    MissingCredentials,

    /// A header value contained characters that cannot be sent.
    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    /// The payload could not be serialized to JSON.
    #[error("Failed to serialize request: {0}")]
    Serialization(String),
}

/// Failures below the HTTP layer.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection, DNS or protocol failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The per-request timeout elapsed.
    #[error("Request timed out")]
    Timeout,

    /// The caller's deadline elapsed before the call completed.
    #[error("Request cancelled before completion")]
    Cancelled,
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Network(error.to_string())
        }
    }
}

impl Error {
    /// Converts a non-success classifier outcome into the error the caller sees.
    ///
    /// `SessionExpired` maps to [`Error::AuthExpired`] because by the time an
    /// outcome is surfaced the refresh-and-retry cycle has been used up.
    pub fn from_outcome(outcome: Outcome) -> Self {
        match outcome {
            Outcome::SessionExpired => Error::AuthExpired,
            Outcome::SessionInvalid => Error::AuthInvalid,
            Outcome::InvalidCredentials { reason } => Error::InvalidCredentials { reason },
            Outcome::Unknown {
                status: Some(status),
                body,
            } => Error::HttpError {
                status,
                raw_response: body,
            },
            Outcome::Unknown { status: None, body } => Error::UnprocessableResponse(body),
            Outcome::Success { status, body } => Error::HttpError {
                status,
                raw_response: String::from_utf8_lossy(&body).into_owned(),
            },
        }
    }

    /// Returns `true` if the caller may retry the whole call later.
    ///
    /// Only transport failures qualify; the client never retries them itself.
    ///
    /// # Examples
    ///
    /// ```
    /// use newbcook_sdk::{Error, TransportError};
    ///
    /// assert!(Error::Transport(TransportError::Timeout).is_retryable());
    /// assert!(!Error::AuthInvalid.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Refresh(RefreshError::Transport(_)))
    }

    /// Returns `true` if the user has to log in again before any further call.
    pub fn requires_login(&self) -> bool {
        match self {
            Error::AuthExpired | Error::AuthInvalid => true,
            Error::Build(BuildError::MissingCredentials) => true,
            Error::Refresh(RefreshError::Rejected { .. }) => true,
            _ => false,
        }
    }

    /// Returns the HTTP status code if the server answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpError { status, .. } => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            Error::InvalidCredentials { .. } => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::HttpError { raw_response, .. } => Some(raw_response),
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }

    /// A short message suitable for showing next to a retry button.
    pub fn user_message(&self) -> String {
        match self {
            Error::Transport(TransportError::Network(_)) => "Check server is running".to_string(),
            Error::Transport(TransportError::Timeout) => {
                "The server took too long to respond".to_string()
            }
            Error::InvalidCredentials { .. } => "Invalid credentials".to_string(),
            Error::AuthExpired => "Session unable to refresh, please log in again".to_string(),
            Error::AuthInvalid => "Session is no longer valid, please re-login".to_string(),
            Error::Build(BuildError::MissingCredentials) => "Please log in".to_string(),
            Error::Refresh(_) => "Session unable to refresh, please log in again".to_string(),
            other => other.to_string(),
        }
    }
}

/// A specialized `Result` type for calls made through this crate.
pub type Result<T> = std::result::Result<T, Error>;
