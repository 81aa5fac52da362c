//! # newbcook-sdk - Client SDK for the NewbCook list service
//!
//! The SDK logs a user in, keeps their access token alive and runs typed calls
//! against the list service. Every authenticated call goes through the
//! [`NetworkManager`], which refreshes a stale token before sending, replays a
//! call once if the server reports the session as expired mid-flight, and
//! clears the stored session when the server says it can no longer be
//! recovered.
//!
//! ## Quick Start
//!
//! ```no_run
//! use newbcook_sdk::{BackendApi, MemoryStore, NetworkManager, ReqwestTransport};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), newbcook_sdk::Error> {
//!     let manager = NetworkManager::builder()
//!         .transport(Arc::new(ReqwestTransport::new()?))
//!         .store(Arc::new(MemoryStore::new()))
//!         .default_timeout(Duration::from_secs(5))
//!         .session_listener(Arc::new(|| eprintln!("Session ended, please log in again")))
//!         .build()?;
//!
//!     let api = BackendApi::new(manager);
//!     api.login("api.example.com", "alice", "secret").await?;
//!
//!     for list in api.list_names().await? {
//!         println!("{} ({})", list.list_name, list.list_id);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Transparent token refresh** - Stale tokens renewed before use, expired ones once mid-flight
//! - **Explicit call state machine** - A call is replayed at most once
//! - **Coalesced refreshes** - Concurrent calls against a stale token share one refresh
//! - **Rich error handling** - Raw status codes and bodies preserved, plus `user_message()` for UIs
//! - **Pluggable seams** - [`Transport`] and [`CredentialStore`] traits with test doubles
//! - **Automatic logging** - Structured logging with `tracing`
//! - **Keychain storage** - `KeyringStore` behind the `keyring` feature
//!
//! ## Custom endpoints
//!
//! [`BackendApi`] covers the service's operations, but any [`Endpoint`] can be
//! executed directly:
//!
//! ```no_run
//! use newbcook_sdk::{Endpoint, Error, HttpMethod, NetworkManager};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct SearchRequest<'a> {
//!     search_request: &'a str,
//!     list_name: &'a str,
//! }
//!
//! # async fn example(manager: NetworkManager) -> Result<(), Error> {
//! let endpoint = Endpoint::new(
//!     HttpMethod::Get,
//!     "find_items_for_user",
//!     &SearchRequest { search_request: "mil", list_name: "groceries" },
//! )?
//! .with_query_params();
//!
//! match manager.execute::<Vec<serde_json::Value>>(&endpoint).await {
//!     Ok(response) => println!("{} hits", response.data.len()),
//!     Err(e) if e.requires_login() => println!("Please log in"),
//!     Err(e) => eprintln!("{}", e.user_message()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
mod classify;
pub mod codec;
mod endpoint;
mod error;
mod network;
pub mod refresh;
mod request;
mod response;
mod store;
mod transport;

pub use api::{BackendApi, ListNameWithId, ListSectionWithEntry, SectionType};
pub use classify::{classify, Outcome};
pub use codec::{AuthenticationToken, BackendError, ErrorReason};
pub use endpoint::{Endpoint, EndpointKind, HttpMethod};
pub use error::{BuildError, Error, Result, TransportError};
pub use network::{NetworkManager, NetworkManagerBuilder, SessionListener};
pub use refresh::{RefreshError, RefreshStep, TokenRefresher};
pub use request::{HttpRequest, RequestBuilder, DEFAULT_TIMEOUT, LOGIN_TIMEOUT};
pub use response::Response;
#[cfg(feature = "keyring")]
pub use store::KeyringStore;
pub use store::{CredentialStore, CredentialStoreExt, Credentials, MemoryStore, Session, StorageKey};
pub use transport::{HttpOutcome, ReqwestTransport, ReqwestTransportBuilder, Transport};
