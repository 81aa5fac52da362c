//! JSON envelope codec.
//!
//! Every successful server response wraps its payload as
//! `{"response": <payload>}`, and 401 responses wrap a [`BackendError`] the
//! same way. This module unwraps both shapes and serializes outgoing payloads.

use crate::error::{BuildError, Error, Result};
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Deserialize)]
struct Envelope<T> {
    response: T,
}

/// Access and refresh token pair issued by login and by the refresh protocol.
///
/// Both tokens always travel together: persisting a new access token without
/// its refresh token would orphan the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AuthenticationToken {
    /// Short-lived bearer token for authenticated calls.
    pub token: String,
    /// Longer-lived token used only to mint a new access token.
    pub refresh_token: String,
}

/// Structured body of a 401 response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackendError {
    /// Human readable message from the server.
    pub message: String,
    /// Status code echoed by the server.
    pub status_code: u32,
    /// Machine readable reason.
    pub reason: ErrorReason,
}

/// Reasons the server reports alongside a 401.
///
/// Reasons this client does not know decode to [`ErrorReason::Unknown`]
/// rather than failing the whole envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum ErrorReason {
    /// Login was attempted with a wrong username or password.
    UsernamePasswordInvalid,
    /// The bearer token was not accepted.
    InvalidToken,
    /// The bearer token could not be parsed.
    InvalidTokenMalformed,
    /// The token refers to a user that does not exist.
    InvalidUserId,
    /// The access token expired; a refresh can recover the session.
    SessionExpired,
    /// No refresh is possible; the user must log in again.
    SessionInvalid,
    /// Any reason this client does not recognise.
    Unknown,
}

impl ErrorReason {
    /// The wire representation of this reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorReason::UsernamePasswordInvalid => "username_password_invalid",
            ErrorReason::InvalidToken => "invalid_token",
            ErrorReason::InvalidTokenMalformed => "invalid_token_malformed",
            ErrorReason::InvalidUserId => "invalid_user_id",
            ErrorReason::SessionExpired => "session_expired",
            ErrorReason::SessionInvalid => "session_invalid",
            ErrorReason::Unknown => "unknown",
        }
    }
}

impl From<String> for ErrorReason {
    fn from(value: String) -> Self {
        match value.as_str() {
            "username_password_invalid" => ErrorReason::UsernamePasswordInvalid,
            "invalid_token" => ErrorReason::InvalidToken,
            "invalid_token_malformed" => ErrorReason::InvalidTokenMalformed,
            "invalid_user_id" => ErrorReason::InvalidUserId,
            "session_expired" => ErrorReason::SessionExpired,
            "session_invalid" => ErrorReason::SessionInvalid,
            _ => ErrorReason::Unknown,
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unwraps `{"response": T}`, returning the raw serde error on mismatch.
pub fn unwrap_envelope<T>(body: &[u8]) -> std::result::Result<T, serde_json::Error>
where
    T: DeserializeOwned,
{
    serde_json::from_slice::<Envelope<T>>(body).map(|envelope| envelope.response)
}

/// Decodes the payload of a successful response.
///
/// # Errors
///
/// Returns [`Error::DeserializationFailed`] with the raw body preserved when
/// the envelope or the payload does not match `T`.
///
/// # Examples
///
/// ```
/// use http::StatusCode;
/// use newbcook_sdk::codec::{decode_envelope, AuthenticationToken};
///
/// let body = br#"{"response":{"token":"abc","refresh_token":"def"}}"#;
/// let token: AuthenticationToken = decode_envelope(StatusCode::OK, body).unwrap();
/// assert_eq!(token.token, "abc");
/// ```
pub fn decode_envelope<T>(status: StatusCode, body: &[u8]) -> Result<T>
where
    T: DeserializeOwned,
{
    unwrap_envelope(body).map_err(|e| {
        let raw_response = String::from_utf8_lossy(body).into_owned();
        tracing::error!(
            error = %e,
            status = status.as_u16(),
            raw_response = %raw_response,
            "Failed to deserialize response"
        );
        Error::DeserializationFailed {
            raw_response,
            serde_error: e.to_string(),
            status,
        }
    })
}

/// Parses a 401 error envelope. Malformed bodies yield `None`.
pub fn decode_error_envelope(body: &[u8]) -> Option<BackendError> {
    unwrap_envelope(body).ok()
}

/// Serializes an outgoing payload into its JSON wire form.
pub fn encode_payload<P>(payload: &P) -> std::result::Result<serde_json::Value, BuildError>
where
    P: Serialize + ?Sized,
{
    serde_json::to_value(payload).map_err(|e| BuildError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u32,
    }

    #[test]
    fn test_decode_envelope() {
        let items: Vec<Item> =
            decode_envelope(StatusCode::OK, br#"{"response":[{"id":1},{"id":2}]}"#).unwrap();
        assert_eq!(items, vec![Item { id: 1 }, Item { id: 2 }]);
    }

    #[test]
    fn test_decode_envelope_missing_wrapper() {
        let err = decode_envelope::<Item>(StatusCode::OK, br#"{"id":1}"#).unwrap_err();
        match err {
            Error::DeserializationFailed {
                raw_response,
                status,
                ..
            } => {
                assert_eq!(raw_response, r#"{"id":1}"#);
                assert_eq!(status, StatusCode::OK);
            }
            other => panic!("Expected DeserializationFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_error_envelope_known_and_unknown_reasons() {
        let body =
            br#"{"response":{"message":"expired","status_code":401,"reason":"session_expired"}}"#;
        let error = decode_error_envelope(body).unwrap();
        assert_eq!(error.reason, ErrorReason::SessionExpired);
        assert_eq!(error.status_code, 401);

        let body = br#"{"response":{"message":"?","status_code":401,"reason":"brand_new_reason"}}"#;
        assert_eq!(decode_error_envelope(body).unwrap().reason, ErrorReason::Unknown);

        assert!(decode_error_envelope(b"<html>nope</html>").is_none());
        assert!(decode_error_envelope(br#"{"response":{"reason":"session_expired"}}"#).is_none());
    }

    #[test]
    fn test_encode_payload() {
        let token = AuthenticationToken {
            token: "a".into(),
            refresh_token: "b".into(),
        };
        let value = encode_payload(&token).unwrap();
        assert_eq!(value["refresh_token"], "b");
    }
}
