//! Response wrapper that preserves both parsed data and call details.
//!
//! The [`Response`] type wraps the decoded payload along with how the call went:
//! timing, the number of primary attempts and whether the session had to be
//! refreshed along the way.

use http::StatusCode;
use std::time::Duration;

/// A successful call through the [`NetworkManager`](crate::NetworkManager).
///
/// # Type Parameters
///
/// * `T` - The type of the decoded payload (the contents of `{"response": ...}`)
///
/// # Examples
///
/// ```no_run
/// use newbcook_sdk::{Endpoint, HttpMethod, NetworkManager};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct ListNames {
///     list_names: Vec<serde_json::Value>,
/// }
///
/// # async fn example(manager: NetworkManager) -> Result<(), newbcook_sdk::Error> {
/// let endpoint = Endpoint::without_payload(HttpMethod::Get, "retrieve_list_names");
/// let response = manager.execute::<ListNames>(&endpoint).await?;
///
/// println!("{} lists", response.data.list_names.len());
/// println!("Call took {:?}", response.latency);
///
/// if response.was_refreshed() {
///     println!("Session was renewed during the call");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The decoded payload.
    pub data: T,

    /// The raw response body as a string, envelope included.
    pub raw_body: String,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// Time from the start of the call until the final response, refreshes included.
    pub latency: Duration,

    /// Primary requests sent: `1`, or `2` after a refresh-and-retry.
    pub attempts: usize,

    /// Whether this call ran a token refresh itself. Reusing a token another
    /// call just refreshed does not count.
    pub refreshed: bool,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(
        data: T,
        raw_body: String,
        status: StatusCode,
        latency: Duration,
        attempts: usize,
        refreshed: bool,
    ) -> Self {
        Self {
            data,
            raw_body,
            status,
            latency,
            attempts,
            refreshed,
        }
    }

    /// Maps the payload to a different type, keeping the call details.
    ///
    /// # Examples
    ///
    /// ```
    /// # use newbcook_sdk::Response;
    /// # use http::StatusCode;
    /// # use std::time::Duration;
    /// let response = Response::new(
    ///     vec!["groceries".to_string()],
    ///     String::new(),
    ///     StatusCode::OK,
    ///     Duration::from_millis(40),
    ///     1,
    ///     false,
    /// );
    ///
    /// let count = response.map(|names| names.len());
    /// assert_eq!(count.data, 1);
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            latency: self.latency,
            attempts: self.attempts,
            refreshed: self.refreshed,
        }
    }

    /// Returns `true` if the call was replayed after a mid-flight refresh.
    ///
    /// # Examples
    ///
    /// ```
    /// # use newbcook_sdk::Response;
    /// # use http::StatusCode;
    /// # use std::time::Duration;
    /// let response = Response::new((), String::new(), StatusCode::OK, Duration::ZERO, 2, true);
    /// assert!(response.was_retried());
    /// ```
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns `true` if this call ran a token refresh, proactively or after
    /// expiry.
    pub fn was_refreshed(&self) -> bool {
        self.refreshed
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}
