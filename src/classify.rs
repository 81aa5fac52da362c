//! Response classification.
//!
//! Maps a raw [`HttpOutcome`] onto the handful of outcomes the network
//! manager reacts to. Classification is total: malformed bodies degrade to a
//! less specific outcome instead of failing.

use crate::codec::{decode_error_envelope, ErrorReason};
use crate::transport::HttpOutcome;
use http::StatusCode;
use std::fmt;

/// What a response means for the call that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// 200 or 201. The body is carried on for decoding.
    Success {
        /// The HTTP status code.
        status: StatusCode,
        /// The raw response body.
        body: Vec<u8>,
    },
    /// The access token is stale; a refresh can recover the session.
    SessionExpired,
    /// The session cannot be recovered; the user must log in again.
    SessionInvalid,
    /// A 401 that is not about the session.
    InvalidCredentials {
        /// The server's reason, when the error envelope parsed.
        reason: Option<ErrorReason>,
    },
    /// Anything else.
    Unknown {
        /// The status, or `None` if the transport reported something that is not HTTP.
        status: Option<StatusCode>,
        /// The body (or a description of the anomaly) for diagnostics.
        body: String,
    },
}

impl Outcome {
    /// Returns `true` for [`Outcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success { status, .. } => write!(f, "success ({})", status),
            Outcome::SessionExpired => f.write_str("session expired"),
            Outcome::SessionInvalid => f.write_str("session invalid"),
            Outcome::InvalidCredentials { reason: Some(reason) } => {
                write!(f, "invalid credentials ({})", reason)
            }
            Outcome::InvalidCredentials { reason: None } => f.write_str("invalid credentials"),
            Outcome::Unknown {
                status: Some(status),
                body,
            } => write!(f, "unexpected status {}: {}", status, body),
            Outcome::Unknown { status: None, body } => write!(f, "{}", body),
        }
    }
}

/// Classifies a raw response.
///
/// # Examples
///
/// ```
/// use newbcook_sdk::{classify, HttpOutcome, Outcome};
///
/// let body = r#"{"response":{"message":"m","status_code":401,"reason":"session_expired"}}"#;
/// assert_eq!(classify(HttpOutcome::new(401, body)), Outcome::SessionExpired);
/// assert!(classify(HttpOutcome::new(201, "{}")).is_success());
/// ```
pub fn classify(outcome: HttpOutcome) -> Outcome {
    let Ok(status) = StatusCode::from_u16(outcome.status) else {
        return Outcome::Unknown {
            status: None,
            body: format!("unprocessable response (status {})", outcome.status),
        };
    };

    match status {
        StatusCode::OK | StatusCode::CREATED => Outcome::Success {
            status,
            body: outcome.body,
        },
        StatusCode::UNAUTHORIZED => match decode_error_envelope(&outcome.body) {
            Some(error) => match error.reason {
                ErrorReason::SessionExpired => Outcome::SessionExpired,
                ErrorReason::SessionInvalid => Outcome::SessionInvalid,
                reason => Outcome::InvalidCredentials {
                    reason: Some(reason),
                },
            },
            None => Outcome::InvalidCredentials { reason: None },
        },
        _ => Outcome::Unknown {
            status: Some(status),
            body: String::from_utf8_lossy(&outcome.body).into_owned(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unauthorized(reason: &str) -> HttpOutcome {
        HttpOutcome::new(
            401,
            format!(
                r#"{{"response":{{"message":"nope","status_code":401,"reason":"{}"}}}}"#,
                reason
            ),
        )
    }

    #[test]
    fn test_success_statuses() {
        assert_eq!(
            classify(HttpOutcome::new(200, "anything")),
            Outcome::Success {
                status: StatusCode::OK,
                body: b"anything".to_vec()
            }
        );
        assert!(classify(HttpOutcome::new(201, "")).is_success());
        assert!(!classify(HttpOutcome::new(204, "")).is_success());
    }

    #[test]
    fn test_unauthorized_reasons() {
        assert_eq!(classify(unauthorized("session_expired")), Outcome::SessionExpired);
        assert_eq!(classify(unauthorized("session_invalid")), Outcome::SessionInvalid);
        assert_eq!(
            classify(unauthorized("username_password_invalid")),
            Outcome::InvalidCredentials {
                reason: Some(ErrorReason::UsernamePasswordInvalid)
            }
        );
        assert_eq!(
            classify(unauthorized("something_new")),
            Outcome::InvalidCredentials {
                reason: Some(ErrorReason::Unknown)
            }
        );
    }

    #[test]
    fn test_malformed_unauthorized_body() {
        assert_eq!(
            classify(HttpOutcome::new(401, "not json at all")),
            Outcome::InvalidCredentials { reason: None }
        );
        assert_eq!(
            classify(HttpOutcome::new(401, r#"{"response":"session_expired"}"#)),
            Outcome::InvalidCredentials { reason: None }
        );
    }

    #[test]
    fn test_other_statuses_are_unknown() {
        match classify(HttpOutcome::new(500, "Server error")) {
            Outcome::Unknown { status, body } => {
                assert_eq!(status, Some(StatusCode::INTERNAL_SERVER_ERROR));
                assert_eq!(body, "Server error");
            }
            other => panic!("Expected Unknown, got {:?}", other),
        }

        // a session reason on a non-401 status is not a session signal
        assert!(matches!(
            classify(HttpOutcome::new(
                403,
                r#"{"response":{"message":"m","status_code":403,"reason":"session_expired"}}"#
            )),
            Outcome::Unknown { .. }
        ));
    }

    #[test]
    fn test_non_http_status() {
        match classify(HttpOutcome::new(0, "")) {
            Outcome::Unknown { status: None, body } => {
                assert!(body.starts_with("unprocessable response"));
            }
            other => panic!("Expected unprocessable Unknown, got {:?}", other),
        }
    }
}
