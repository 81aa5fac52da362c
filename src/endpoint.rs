//! Endpoint descriptors.
//!
//! An [`Endpoint`] describes one remote operation: where it lives, which verb
//! it uses, whether its parameters travel in the query string, and the payload
//! itself. The payload is converted to its JSON wire form when the descriptor
//! is constructed, so a descriptor is a plain immutable value afterwards.

use crate::codec::encode_payload;
use crate::error::BuildError;
use http::Method;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Path of the login endpoint.
pub const LOGIN_PATH: &str = "login";
/// Path that mints a new access token from a refresh token.
pub const GET_NEW_TOKEN_PATH: &str = "jwt_life_cycle_maintainer_get_new_token";
/// Path that confirms a freshly minted access token with the server.
pub const SAVE_NEW_TOKEN_PATH: &str = "jwt_life_cycle_maintainer_save_new_token";

/// HTTP verbs used by the list service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl HttpMethod {
    /// Returns `true` for verbs that may carry a JSON body.
    pub fn carries_body(self) -> bool {
        !matches!(self, HttpMethod::Get)
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Method::from(*self).as_str())
    }
}

/// Whether an endpoint is called with the stored access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// A business call that carries `Authorization: Bearer <token>`.
    Authenticated,
    /// The login call, sent without an Authorization header.
    Login,
}

/// A description of one remote operation.
///
/// # Examples
///
/// ```
/// use newbcook_sdk::{Endpoint, HttpMethod};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct ViewList {
///     list_name: String,
/// }
///
/// let endpoint = Endpoint::new(
///     HttpMethod::Get,
///     "retrieve_list",
///     &ViewList { list_name: "groceries".to_string() },
/// )
/// .unwrap()
/// .with_query_params();
///
/// assert!(endpoint.sends_params_in_query());
/// assert_eq!(endpoint.payload()["list_name"], "groceries");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    path: String,
    method: HttpMethod,
    send_params_in_query: bool,
    payload: serde_json::Value,
    kind: EndpointKind,
    timeout: Option<Duration>,
}

impl Endpoint {
    /// Creates an authenticated endpoint with a serializable payload.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Serialization`] if the payload cannot be
    /// represented as JSON.
    pub fn new<P>(
        method: HttpMethod,
        path: impl Into<String>,
        payload: &P,
    ) -> Result<Self, BuildError>
    where
        P: Serialize + ?Sized,
    {
        Ok(Self {
            path: path.into(),
            method,
            send_params_in_query: false,
            payload: encode_payload(payload)?,
            kind: EndpointKind::Authenticated,
            timeout: None,
        })
    }

    /// Creates an authenticated endpoint that sends no parameters.
    pub fn without_payload(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            send_params_in_query: false,
            payload: serde_json::Value::Null,
            kind: EndpointKind::Authenticated,
            timeout: None,
        }
    }

    /// The login descriptor: `POST login` with the username and password as body.
    pub fn login(username: &str, password: &str) -> Self {
        Self {
            path: LOGIN_PATH.to_string(),
            method: HttpMethod::Post,
            send_params_in_query: false,
            payload: serde_json::json!({
                "username": username,
                "password": password,
            }),
            kind: EndpointKind::Login,
            timeout: None,
        }
    }

    /// Sends the payload's scalar fields as query parameters.
    pub fn with_query_params(mut self) -> Self {
        self.send_params_in_query = true;
        self
    }

    /// Overrides the request timeout for this endpoint only.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The path relative to the host, without a leading slash.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The HTTP verb.
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Whether scalar payload fields go in the query string.
    pub fn sends_params_in_query(&self) -> bool {
        self.send_params_in_query
    }

    /// The payload in its JSON wire form.
    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Whether this is the login descriptor.
    pub fn is_login(&self) -> bool {
        self.kind == EndpointKind::Login
    }

    /// The endpoint-specific timeout, if one was set.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    #[serde(rename_all = "snake_case")]
    struct UpdateItem {
        list_id: u64,
        entry_is_check_marked: bool,
    }

    #[test]
    fn test_payload_uses_wire_names() {
        let endpoint = Endpoint::new(
            HttpMethod::Patch,
            "update_list_entry_values",
            &UpdateItem {
                list_id: 7,
                entry_is_check_marked: true,
            },
        )
        .unwrap();

        assert_eq!(endpoint.payload()["list_id"], 7);
        assert_eq!(endpoint.payload()["entry_is_check_marked"], true);
        assert!(!endpoint.is_login());
        assert!(!endpoint.sends_params_in_query());
    }

    #[test]
    fn test_login_descriptor() {
        let endpoint = Endpoint::login("alice", "secret");
        assert!(endpoint.is_login());
        assert_eq!(endpoint.method(), HttpMethod::Post);
        assert_eq!(endpoint.path(), LOGIN_PATH);
        assert_eq!(
            endpoint.payload(),
            &serde_json::json!({"username": "alice", "password": "secret"})
        );
    }

    #[test]
    fn test_method_conversion() {
        assert_eq!(Method::from(HttpMethod::Patch), Method::PATCH);
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
        assert!(!HttpMethod::Get.carries_body());
        assert!(HttpMethod::Delete.carries_body());
    }
}
