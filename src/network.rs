//! The call orchestrator.
//!
//! [`NetworkManager`] is the main entry point for authenticated calls. Every
//! call runs through a small state machine:
//!
//! ```text
//! NotStarted ──stale token──▶ ProactiveRefresh ──▶ Executing
//!     │                                               │
//!     └──────────valid token─────────────────────────▶│
//!                                                     ├─success──────────▶ Done
//!                                                     ├─session expired──▶ RetryingAfterRefresh
//!                                                     └─anything else────▶ error
//!
//! RetryingAfterRefresh ──refresh, replay once──▶ Done | error
//! ```
//!
//! A call sends at most two primary requests and at most one refresh
//! sequence after the first of them. Use [`NetworkManagerBuilder`] to
//! configure and create managers.

use crate::classify::{classify, Outcome};
use crate::codec::{decode_envelope, AuthenticationToken, ErrorReason};
use crate::endpoint::Endpoint;
use crate::error::{Error, Result, TransportError};
use crate::refresh::TokenRefresher;
use crate::request::RequestBuilder;
use crate::response::Response;
use crate::store::{CredentialStore, CredentialStoreExt, Credentials, Session, StorageKey};
use crate::transport::Transport;
use http::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Notified when the server declares the session unrecoverable.
///
/// Credentials have already been cleared when [`session_invalidated`] runs;
/// a UI typically reacts by routing to its login screen. Closures implement
/// this trait directly.
///
/// [`session_invalidated`]: SessionListener::session_invalidated
pub trait SessionListener: Send + Sync {
    /// Called once per call that ends in [`Error::AuthInvalid`].
    fn session_invalidated(&self);
}

impl<F> SessionListener for F
where
    F: Fn() + Send + Sync,
{
    fn session_invalidated(&self) {
        self()
    }
}

/// Where a call currently stands.
enum CallState {
    NotStarted,
    ProactiveRefresh(Session),
    Executing(Session),
    RetryingAfterRefresh(Session),
    Done { status: StatusCode, body: Vec<u8> },
}

/// Executes endpoint descriptors with transparent token refresh.
///
/// The manager is cheap to clone and is meant to be shared; clones use the
/// same transport, store and refresh lock.
///
/// # Examples
///
/// ```no_run
/// use newbcook_sdk::{Endpoint, HttpMethod, MemoryStore, NetworkManager, ReqwestTransport};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), newbcook_sdk::Error> {
/// let manager = NetworkManager::builder()
///     .transport(Arc::new(ReqwestTransport::new()?))
///     .store(Arc::new(MemoryStore::new()))
///     .build()?;
///
/// manager.login("api.example.com", "alice", "secret").await?;
///
/// let endpoint = Endpoint::without_payload(HttpMethod::Get, "retrieve_list_names");
/// let response = manager.execute::<serde_json::Value>(&endpoint).await?;
/// println!("{}", response.data);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct NetworkManager {
    inner: Arc<NetworkManagerInner>,
}

struct NetworkManagerInner {
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    request_builder: RequestBuilder,
    session_listener: Option<Arc<dyn SessionListener>>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl NetworkManager {
    /// Creates a new `NetworkManagerBuilder`.
    pub fn builder() -> NetworkManagerBuilder {
        NetworkManagerBuilder::new()
    }

    /// Executes an authenticated call and decodes its `{"response": T}` payload.
    ///
    /// A stale stored token is refreshed before the call is sent. If the
    /// server reports the session as expired mid-flight, the token is
    /// refreshed and the call replayed exactly once.
    ///
    /// # Errors
    ///
    /// * [`Error::Build`] if there is no stored session or the request is malformed
    /// * [`Error::Transport`] if a request got no answer
    /// * [`Error::AuthInvalid`] if the server invalidated the session; credentials are cleared
    /// * [`Error::AuthExpired`] if the token was still expired after a refresh
    /// * [`Error::Refresh`] if the refresh sequence failed
    /// * [`Error::InvalidCredentials`], [`Error::HttpError`] for other non-success answers
    /// * [`Error::DeserializationFailed`] if the payload does not match `T`
    pub async fn execute<T>(&self, endpoint: &Endpoint) -> Result<Response<T>>
    where
        T: DeserializeOwned,
    {
        let start_time = Instant::now();
        let mut attempts = 0;
        let mut refreshed = false;
        let mut state = CallState::NotStarted;

        let (status, body) = loop {
            state = match state {
                CallState::NotStarted => {
                    let session = self.inner.store.load_session()?;
                    if session.credentials.valid {
                        CallState::Executing(session)
                    } else {
                        tracing::debug!(
                            path = %endpoint.path(),
                            "Stored token is stale, refreshing first"
                        );
                        CallState::ProactiveRefresh(session)
                    }
                }
                CallState::ProactiveRefresh(session) => {
                    let (session, ran) = self.refresh_session(session).await?;
                    refreshed |= ran;
                    CallState::Executing(session)
                }
                CallState::Executing(session) => {
                    attempts += 1;
                    match self.send(endpoint, &session).await? {
                        Outcome::Success { status, body } => CallState::Done { status, body },
                        Outcome::SessionExpired => {
                            tracing::warn!(
                                method = %endpoint.method(),
                                path = %endpoint.path(),
                                "Session expired, refreshing and retrying once"
                            );
                            self.mark_stale(&session);
                            CallState::RetryingAfterRefresh(session)
                        }
                        Outcome::SessionInvalid => return Err(self.invalidate_session()),
                        outcome => return Err(self.fail(endpoint, attempts, outcome)),
                    }
                }
                CallState::RetryingAfterRefresh(session) => {
                    let (session, ran) = self.refresh_session(session).await?;
                    refreshed |= ran;
                    attempts += 1;
                    match self.send(endpoint, &session).await? {
                        Outcome::Success { status, body } => CallState::Done { status, body },
                        Outcome::SessionInvalid => return Err(self.invalidate_session()),
                        Outcome::SessionExpired => {
                            self.mark_stale(&session);
                            return Err(self.fail(endpoint, attempts, Outcome::SessionExpired));
                        }
                        outcome => return Err(self.fail(endpoint, attempts, outcome)),
                    }
                }
                CallState::Done { status, body } => break (status, body),
            };
        };

        let latency = start_time.elapsed();

        tracing::info!(
            method = %endpoint.method(),
            path = %endpoint.path(),
            status = status.as_u16(),
            latency_ms = latency.as_millis(),
            attempts = attempts,
            refreshed = refreshed,
            "Call completed"
        );

        let data = decode_envelope::<T>(status, &body)?;
        let raw_body = String::from_utf8_lossy(&body).into_owned();

        Ok(Response::new(data, raw_body, status, latency, attempts, refreshed))
    }

    /// Like [`execute`](Self::execute), but gives up once `deadline` elapses.
    ///
    /// Whatever was in flight is dropped. A refresh that had already been
    /// persisted stays persisted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] with [`TransportError::Cancelled`] when the
    /// deadline elapses first, otherwise whatever `execute` returns.
    pub async fn execute_with_deadline<T>(
        &self,
        endpoint: &Endpoint,
        deadline: Duration,
    ) -> Result<Response<T>>
    where
        T: DeserializeOwned,
    {
        match tokio::time::timeout(deadline, self.execute(endpoint)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    path = %endpoint.path(),
                    deadline_ms = deadline.as_millis(),
                    "Call cancelled at deadline"
                );
                Err(Error::Transport(TransportError::Cancelled))
            }
        }
    }

    /// Logs in and persists the new session.
    ///
    /// Hostname, username, both tokens and the validity flag are stored in a
    /// single update.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCredentials`] for any 401, and the usual
    /// transport, status and decoding errors otherwise.
    pub async fn login(
        &self,
        hostname: &str,
        username: &str,
        password: &str,
    ) -> Result<AuthenticationToken> {
        let endpoint = Endpoint::login(username, password);
        let request = self.inner.request_builder.build(&endpoint, hostname, None)?;
        let response = self.inner.transport.send(request).await?;

        match classify(response) {
            Outcome::Success { status, body } => {
                let token: AuthenticationToken = decode_envelope(status, &body)?;
                self.inner.store.save_login(hostname, username, &token);
                tracing::info!(hostname = %hostname, username = %username, "Logged in");
                Ok(token)
            }
            outcome => {
                tracing::warn!(hostname = %hostname, outcome = %outcome, "Login failed");
                Err(match outcome {
                    Outcome::SessionExpired => Error::InvalidCredentials {
                        reason: Some(ErrorReason::SessionExpired),
                    },
                    Outcome::SessionInvalid => Error::InvalidCredentials {
                        reason: Some(ErrorReason::SessionInvalid),
                    },
                    other => Error::from_outcome(other),
                })
            }
        }
    }

    /// Forgets the session. The hostname is kept for the next login.
    pub fn logout(&self) {
        self.inner.store.clear_session();
        tracing::info!("Logged out");
    }

    /// Returns `true` if an access token is stored.
    pub fn is_authenticated(&self) -> bool {
        self.inner.store.get(StorageKey::AccessToken).is_some()
    }

    /// Returns the hostname of the last login, if any.
    pub fn stored_hostname(&self) -> Option<String> {
        self.inner.store.get(StorageKey::Hostname)
    }

    /// Returns the credential store this manager reads and writes.
    pub fn store(&self) -> &dyn CredentialStore {
        self.inner.store.as_ref()
    }

    async fn send(&self, endpoint: &Endpoint, session: &Session) -> Result<Outcome> {
        let request = self.inner.request_builder.build(
            endpoint,
            &session.hostname,
            Some(session.credentials.access_token.as_str()),
        )?;
        let response = self.inner.transport.send(request).await?;
        Ok(classify(response))
    }

    /// Refreshes the session that `stale` was loaded from.
    ///
    /// Concurrent callers queue on the refresh lock. Whoever gets it second
    /// finds a valid token that differs from its stale one and reuses it.
    /// The flag is `true` only when this call ran the refresh itself.
    async fn refresh_session(&self, stale: Session) -> Result<(Session, bool)> {
        let _guard = self.inner.refresh_lock.lock().await;

        let current = self.inner.store.load_session()?;
        let replaced = current.credentials.access_token != stale.credentials.access_token;
        if current.credentials.valid && replaced {
            tracing::debug!("Reusing token refreshed by a concurrent call");
            return Ok((current, false));
        }

        let refresher =
            TokenRefresher::new(self.inner.transport.as_ref(), &self.inner.request_builder);
        match refresher
            .refresh(&current.hostname, &current.credentials.refresh_token)
            .await
        {
            Ok(token) => {
                self.inner.store.save_refreshed(&token);
                let session = Session {
                    hostname: current.hostname,
                    credentials: Credentials {
                        access_token: token.token,
                        refresh_token: token.refresh_token,
                        valid: true,
                    },
                };
                Ok((session, true))
            }
            Err(e) if e.is_session_invalid() => Err(self.invalidate_session()),
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed");
                Err(Error::Refresh(e))
            }
        }
    }

    /// Flags `session` as stale unless a concurrent refresh already replaced it.
    fn mark_stale(&self, session: &Session) {
        if !self.inner.store.mark_stale_if(&session.credentials.access_token) {
            tracing::debug!("Stale token already replaced by a concurrent refresh");
        }
    }

    fn invalidate_session(&self) -> Error {
        tracing::error!("Session invalidated by server, clearing credentials");
        self.inner.store.clear_session();
        if let Some(listener) = &self.inner.session_listener {
            listener.session_invalidated();
        }
        Error::AuthInvalid
    }

    fn fail(&self, endpoint: &Endpoint, attempts: usize, outcome: Outcome) -> Error {
        tracing::warn!(
            method = %endpoint.method(),
            path = %endpoint.path(),
            attempts = attempts,
            outcome = %outcome,
            "Call failed"
        );
        Error::from_outcome(outcome)
    }
}

/// Builder for configuring and creating a [`NetworkManager`].
///
/// # Examples
///
/// ```no_run
/// use newbcook_sdk::{MemoryStore, NetworkManagerBuilder, ReqwestTransport};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), newbcook_sdk::Error> {
/// let manager = NetworkManagerBuilder::new()
///     .transport(Arc::new(ReqwestTransport::new()?))
///     .store(Arc::new(MemoryStore::new()))
///     .scheme("https")
///     .default_timeout(Duration::from_secs(10))
///     .session_listener(Arc::new(|| println!("please log in again")))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct NetworkManagerBuilder {
    transport: Option<Arc<dyn Transport>>,
    store: Option<Arc<dyn CredentialStore>>,
    request_builder: RequestBuilder,
    session_listener: Option<Arc<dyn SessionListener>>,
}

impl NetworkManagerBuilder {
    /// Creates a new `NetworkManagerBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            transport: None,
            store: None,
            request_builder: RequestBuilder::new(),
            session_listener: None,
        }
    }

    /// Sets the transport requests are sent through.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the credential store.
    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the URL scheme, `http` (the default) or `https`.
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.request_builder = self.request_builder.scheme(scheme);
        self
    }

    /// Sets the timeout for authenticated calls.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.request_builder = self.request_builder.default_timeout(timeout);
        self
    }

    /// Sets the timeout for login.
    pub fn login_timeout(mut self, timeout: Duration) -> Self {
        self.request_builder = self.request_builder.login_timeout(timeout);
        self
    }

    /// Registers the listener told about irrecoverable sessions.
    pub fn session_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.session_listener = Some(listener);
        self
    }

    /// Builds the configured `NetworkManager`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if the transport or store is
    /// missing, or the scheme is neither `http` nor `https`.
    pub fn build(self) -> Result<NetworkManager> {
        let transport = self
            .transport
            .ok_or_else(|| Error::ConfigurationError("Transport is required".to_string()))?;
        let store = self
            .store
            .ok_or_else(|| Error::ConfigurationError("Credential store is required".to_string()))?;

        let scheme = self.request_builder.scheme_name();
        if scheme != "http" && scheme != "https" {
            return Err(Error::ConfigurationError(format!("Unsupported scheme: {}", scheme)));
        }

        Ok(NetworkManager {
            inner: Arc::new(NetworkManagerInner {
                transport,
                store,
                request_builder: self.request_builder,
                session_listener: self.session_listener,
                refresh_lock: tokio::sync::Mutex::new(()),
            }),
        })
    }
}

impl Default for NetworkManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
