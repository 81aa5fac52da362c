//! The token refresh protocol.
//!
//! Minting a new access token takes two calls, in order:
//!
//! 1. `POST jwt_life_cycle_maintainer_get_new_token` with the refresh token as
//!    bearer, answered by `{"response": {"token", "refresh_token"}}`.
//! 2. `PATCH jwt_life_cycle_maintainer_save_new_token` with the new access
//!    token as bearer, confirming it server side.
//!
//! The pair is only handed back once both calls succeeded. The protocol never
//! writes to the credential store itself; persisting the pair is the caller's
//! job and must happen in a single update.

use crate::classify::{classify, Outcome};
use crate::codec::{unwrap_envelope, AuthenticationToken};
use crate::endpoint::{Endpoint, HttpMethod, GET_NEW_TOKEN_PATH, SAVE_NEW_TOKEN_PATH};
use crate::error::{BuildError, TransportError};
use crate::request::RequestBuilder;
use crate::transport::Transport;
use std::fmt;

/// The sub-call of the refresh protocol that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStep {
    /// Fetching a new token pair.
    GetNewToken,
    /// Confirming the new access token.
    SaveNewToken,
}

impl fmt::Display for RefreshStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshStep::GetNewToken => f.write_str(GET_NEW_TOKEN_PATH),
            RefreshStep::SaveNewToken => f.write_str(SAVE_NEW_TOKEN_PATH),
        }
    }
}

/// Why a refresh did not produce a new token pair.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// The server answered one of the sub-calls with a non-success outcome.
    #[error("Token refresh rejected at {step}: {outcome}")]
    Rejected {
        /// Which sub-call was rejected.
        step: RefreshStep,
        /// How the response was classified.
        outcome: Outcome,
    },

    /// The new token pair could not be decoded.
    #[error("Token refresh returned a malformed token: {serde_error}")]
    Malformed {
        /// The raw response body.
        raw_response: String,
        /// The serde error message.
        serde_error: String,
    },

    /// A refresh request could not be built.
    #[error("Token refresh request could not be built: {0}")]
    Build(#[from] BuildError),

    /// A refresh request never got an answer.
    #[error("Token refresh transport failure: {0}")]
    Transport(#[from] TransportError),
}

impl RefreshError {
    /// Returns `true` if the server said the session cannot be recovered.
    pub fn is_session_invalid(&self) -> bool {
        matches!(
            self,
            RefreshError::Rejected {
                outcome: Outcome::SessionInvalid,
                ..
            }
        )
    }
}

/// Runs the refresh protocol over a transport.
pub struct TokenRefresher<'a> {
    transport: &'a dyn Transport,
    request_builder: &'a RequestBuilder,
}

impl<'a> TokenRefresher<'a> {
    /// Creates a refresher that sends through `transport`.
    pub fn new(transport: &'a dyn Transport, request_builder: &'a RequestBuilder) -> Self {
        Self {
            transport,
            request_builder,
        }
    }

    /// Exchanges `refresh_token` for a new, server-confirmed token pair.
    ///
    /// # Errors
    ///
    /// Fails at the first sub-call that does not succeed; nothing after it runs.
    pub async fn refresh(
        &self,
        hostname: &str,
        refresh_token: &str,
    ) -> Result<AuthenticationToken, RefreshError> {
        tracing::debug!(hostname = %hostname, "Requesting new access token");

        let get_new_token = Endpoint::without_payload(HttpMethod::Post, GET_NEW_TOKEN_PATH);
        let body = self
            .exchange(RefreshStep::GetNewToken, &get_new_token, hostname, refresh_token)
            .await?;

        let token: AuthenticationToken = unwrap_envelope(&body).map_err(|e| {
            let raw_response = String::from_utf8_lossy(&body).into_owned();
            tracing::error!(
                error = %e,
                raw_response = %raw_response,
                "Failed to decode refreshed token"
            );
            RefreshError::Malformed {
                raw_response,
                serde_error: e.to_string(),
            }
        })?;

        let save_new_token = Endpoint::without_payload(HttpMethod::Patch, SAVE_NEW_TOKEN_PATH);
        self.exchange(RefreshStep::SaveNewToken, &save_new_token, hostname, &token.token)
            .await?;

        tracing::info!(hostname = %hostname, "Access token refreshed");

        Ok(token)
    }

    async fn exchange(
        &self,
        step: RefreshStep,
        endpoint: &Endpoint,
        hostname: &str,
        bearer: &str,
    ) -> Result<Vec<u8>, RefreshError> {
        let request = self.request_builder.build(endpoint, hostname, Some(bearer))?;
        let response = self.transport.send(request).await?;

        match classify(response) {
            Outcome::Success { body, .. } => Ok(body),
            outcome => {
                tracing::warn!(step = %step, outcome = %outcome, "Token refresh rejected");
                Err(RefreshError::Rejected { step, outcome })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::HttpRequest;
    use crate::transport::HttpOutcome;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct Scripted {
        responses: Mutex<VecDeque<HttpOutcome>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl Scripted {
        fn new(responses: Vec<HttpOutcome>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(&self, request: HttpRequest) -> Result<HttpOutcome, TransportError> {
            self.requests.lock().push(request);
            self.responses
                .lock()
                .pop_front()
                .ok_or_else(|| TransportError::Network("no scripted response".into()))
        }
    }

    const NEW_TOKEN: &str = r#"{"response":{"token":"access-2","refresh_token":"refresh-2"}}"#;

    #[tokio::test]
    async fn test_refresh_sequence() {
        let transport = Scripted::new(vec![
            HttpOutcome::new(200, NEW_TOKEN),
            HttpOutcome::new(200, r#"{"response":{}}"#),
        ]);
        let builder = RequestBuilder::new();

        let token = TokenRefresher::new(&transport, &builder)
            .refresh("api.example.com", "refresh-1")
            .await
            .unwrap();

        assert_eq!(token.token, "access-2");
        assert_eq!(token.refresh_token, "refresh-2");

        let requests = transport.requests.lock();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, http::Method::POST);
        assert_eq!(requests[0].path(), GET_NEW_TOKEN_PATH);
        assert_eq!(requests[0].header("authorization"), Some("Bearer refresh-1"));
        assert_eq!(requests[1].method, http::Method::PATCH);
        assert_eq!(requests[1].path(), SAVE_NEW_TOKEN_PATH);
        assert_eq!(requests[1].header("authorization"), Some("Bearer access-2"));
    }

    #[tokio::test]
    async fn test_get_new_token_rejected_stops_sequence() {
        let transport = Scripted::new(vec![HttpOutcome::new(
            401,
            r#"{"response":{"message":"m","status_code":401,"reason":"session_invalid"}}"#,
        )]);
        let builder = RequestBuilder::new();

        let err = TokenRefresher::new(&transport, &builder)
            .refresh("api.example.com", "refresh-1")
            .await
            .unwrap_err();

        assert!(err.is_session_invalid());
        assert_eq!(transport.requests.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_token() {
        let transport = Scripted::new(vec![HttpOutcome::new(200, r#"{"response":{"token":"x"}}"#)]);
        let builder = RequestBuilder::new();

        let err = TokenRefresher::new(&transport, &builder)
            .refresh("api.example.com", "refresh-1")
            .await
            .unwrap_err();

        assert!(matches!(err, RefreshError::Malformed { .. }));
        assert_eq!(transport.requests.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_save_rejected() {
        let transport = Scripted::new(vec![
            HttpOutcome::new(200, NEW_TOKEN),
            HttpOutcome::new(500, "db down"),
        ]);
        let builder = RequestBuilder::new();

        let err = TokenRefresher::new(&transport, &builder)
            .refresh("api.example.com", "refresh-1")
            .await
            .unwrap_err();

        match err {
            RefreshError::Rejected { step, outcome } => {
                assert_eq!(step, RefreshStep::SaveNewToken);
                assert!(matches!(outcome, Outcome::Unknown { .. }));
            }
            other => panic!("Expected Rejected, got {:?}", other),
        }
    }
}
