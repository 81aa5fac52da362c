//! Call state machine tests against a scripted in-memory transport.

use async_trait::async_trait;
use newbcook_sdk::{
    CredentialStore, CredentialStoreExt, Endpoint, Error, HttpMethod, HttpOutcome, HttpRequest,
    MemoryStore, NetworkManager, RefreshError, RefreshStep, StorageKey, Transport,
    TransportError,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const HOST: &str = "api.example.com";
const BUSINESS: &str = "retrieve_list_names";
const GET_NEW_TOKEN: &str = "jwt_life_cycle_maintainer_get_new_token";
const SAVE_NEW_TOKEN: &str = "jwt_life_cycle_maintainer_save_new_token";

type Handler = Box<dyn Fn(&HttpRequest) -> Result<HttpOutcome, TransportError> + Send + Sync>;

/// Answers every request through `handler` and records what it saw.
struct ScriptedTransport {
    handler: Handler,
    latency: Duration,
    log: Mutex<Vec<(String, Option<String>)>>,
}

impl ScriptedTransport {
    fn new<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> Result<HttpOutcome, TransportError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            latency: Duration::ZERO,
            log: Mutex::new(Vec::new()),
        }
    }

    fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn count(&self, path: &str) -> usize {
        self.log.lock().iter().filter(|(p, _)| p == path).count()
    }

    fn bearers(&self, path: &str) -> Vec<String> {
        self.log
            .lock()
            .iter()
            .filter(|(p, _)| p == path)
            .filter_map(|(_, bearer)| bearer.clone())
            .collect()
    }

    fn paths(&self) -> Vec<String> {
        self.log.lock().iter().map(|(p, _)| p.clone()).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpOutcome, TransportError> {
        self.log.lock().push((
            request.path().to_string(),
            request.header("authorization").map(str::to_string),
        ));
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        (self.handler)(&request)
    }
}

fn unauthorized(reason: &str) -> Result<HttpOutcome, TransportError> {
    Ok(HttpOutcome::new(
        401,
        format!(
            r#"{{"response":{{"message":"m","status_code":401,"reason":"{}"}}}}"#,
            reason
        ),
    ))
}

fn ok(body: &str) -> Result<HttpOutcome, TransportError> {
    Ok(HttpOutcome::new(200, body))
}

fn new_token() -> Result<HttpOutcome, TransportError> {
    ok(r#"{"response":{"token":"a2","refresh_token":"r2"}}"#)
}

fn business() -> Endpoint {
    Endpoint::without_payload(HttpMethod::Get, BUSINESS)
}

fn setup(
    transport: ScriptedTransport,
    valid: bool,
) -> (NetworkManager, Arc<ScriptedTransport>, Arc<MemoryStore>) {
    let transport = Arc::new(transport);
    let store = Arc::new(MemoryStore::with_session(HOST, "a1", "r1", valid));
    let manager = NetworkManager::builder()
        .transport(transport.clone())
        .store(store.clone())
        .build()
        .unwrap();
    (manager, transport, store)
}

#[tokio::test]
async fn test_always_expired_server_is_retried_once() {
    let (manager, transport, store) = setup(
        ScriptedTransport::new(|request| match request.path() {
            GET_NEW_TOKEN => new_token(),
            SAVE_NEW_TOKEN => ok(r#"{"response":{}}"#),
            _ => unauthorized("session_expired"),
        }),
        true,
    );

    let err = manager.execute::<serde_json::Value>(&business()).await.unwrap_err();

    assert!(matches!(err, Error::AuthExpired));
    assert!(err.requires_login());
    assert_eq!(transport.count(BUSINESS), 2);
    assert_eq!(transport.count(GET_NEW_TOKEN), 1);
    assert_eq!(transport.count(SAVE_NEW_TOKEN), 1);
    assert_eq!(transport.bearers(BUSINESS), vec!["Bearer a1", "Bearer a2"]);

    let credentials = store.load_session().unwrap().credentials;
    assert_eq!(credentials.access_token, "a2");
    assert!(!credentials.valid);
}

#[tokio::test]
async fn test_failed_save_leaves_credentials_untouched() {
    let (manager, transport, store) = setup(
        ScriptedTransport::new(|request| match request.path() {
            GET_NEW_TOKEN => new_token(),
            SAVE_NEW_TOKEN => Ok(HttpOutcome::new(500, "db down")),
            _ => unauthorized("session_expired"),
        }),
        true,
    );

    let err = manager.execute::<serde_json::Value>(&business()).await.unwrap_err();

    match err {
        Error::Refresh(RefreshError::Rejected { step, .. }) => {
            assert_eq!(step, RefreshStep::SaveNewToken)
        }
        other => panic!("Expected a rejected refresh, got {:?}", other),
    }
    assert_eq!(transport.count(BUSINESS), 1);

    let credentials = store.load_session().unwrap().credentials;
    assert_eq!(credentials.access_token, "a1");
    assert_eq!(credentials.refresh_token, "r1");
    assert!(!credentials.valid);
}

#[tokio::test]
async fn test_stale_token_refreshes_exactly_once_before_the_call() {
    let (manager, transport, store) = setup(
        ScriptedTransport::new(|request| match request.path() {
            GET_NEW_TOKEN => new_token(),
            SAVE_NEW_TOKEN => ok(r#"{"response":{}}"#),
            _ => ok(r#"{"response":{"list_names":[]}}"#),
        }),
        false,
    );

    let response = manager.execute::<serde_json::Value>(&business()).await.unwrap();

    assert_eq!(response.attempts, 1);
    assert!(response.was_refreshed());
    assert!(!response.was_retried());
    assert_eq!(transport.paths(), vec![GET_NEW_TOKEN, SAVE_NEW_TOKEN, BUSINESS]);
    assert_eq!(transport.bearers(GET_NEW_TOKEN), vec!["Bearer r1"]);
    assert_eq!(transport.bearers(SAVE_NEW_TOKEN), vec!["Bearer a2"]);
    assert_eq!(transport.bearers(BUSINESS), vec!["Bearer a2"]);
    assert!(store.load_session().unwrap().credentials.valid);
}

#[tokio::test]
async fn test_concurrent_calls_share_one_refresh() {
    let (manager, transport, _store) = setup(
        ScriptedTransport::new(|request| match request.path() {
            GET_NEW_TOKEN => new_token(),
            SAVE_NEW_TOKEN => ok(r#"{"response":{}}"#),
            _ => ok(r#"{"response":{"list_names":[]}}"#),
        })
        .with_latency(Duration::from_millis(20)),
        false,
    );

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.execute::<serde_json::Value>(&business()).await })
        })
        .collect();

    let mut refreshed = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().was_refreshed() {
            refreshed += 1;
        }
    }

    assert_eq!(refreshed, 1);
    assert_eq!(transport.count(GET_NEW_TOKEN), 1);
    assert_eq!(transport.count(SAVE_NEW_TOKEN), 1);
    assert_eq!(transport.count(BUSINESS), 5);
    assert!(transport.bearers(BUSINESS).iter().all(|b| b == "Bearer a2"));
}

#[tokio::test]
async fn test_concurrent_expired_calls_credit_one_refresh() {
    let (manager, transport, store) = setup(
        ScriptedTransport::new(|request| match (request.path(), request.header("authorization")) {
            (GET_NEW_TOKEN, _) => new_token(),
            (SAVE_NEW_TOKEN, _) => ok(r#"{"response":{}}"#),
            (_, Some("Bearer a1")) => unauthorized("session_expired"),
            _ => ok(r#"{"response":{"list_names":[]}}"#),
        })
        .with_latency(Duration::from_millis(20)),
        true,
    );

    let endpoint = business();
    let (a, b) = tokio::join!(
        manager.execute::<serde_json::Value>(&endpoint),
        manager.execute::<serde_json::Value>(&endpoint),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(transport.count(GET_NEW_TOKEN), 1);
    assert_eq!(a.attempts, 2);
    assert_eq!(b.attempts, 2);
    assert!(a.was_refreshed() != b.was_refreshed());
    assert!(store.load_session().unwrap().credentials.valid);
}

#[tokio::test]
async fn test_retry_answered_with_session_invalid_logs_out() {
    let notified = Arc::new(AtomicUsize::new(0));
    let notified_clone = notified.clone();
    let transport = Arc::new(ScriptedTransport::new(|request| {
        match (request.path(), request.header("authorization")) {
            (GET_NEW_TOKEN, _) => new_token(),
            (SAVE_NEW_TOKEN, _) => ok(r#"{"response":{}}"#),
            (_, Some("Bearer a1")) => unauthorized("session_expired"),
            _ => unauthorized("session_invalid"),
        }
    }));
    let store = Arc::new(MemoryStore::with_session(HOST, "a1", "r1", true));
    store.set(StorageKey::Username, "alice");
    let manager = NetworkManager::builder()
        .transport(transport.clone())
        .store(store.clone())
        .session_listener(Arc::new(move || {
            notified_clone.fetch_add(1, Ordering::SeqCst);
        }))
        .build()
        .unwrap();

    let err = manager.execute::<serde_json::Value>(&business()).await.unwrap_err();

    assert!(matches!(err, Error::AuthInvalid));
    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert_eq!(transport.count(BUSINESS), 2);
    for key in StorageKey::SESSION {
        assert!(store.get(key).is_none(), "{} should be cleared", key);
    }
    assert_eq!(store.get(StorageKey::Hostname).as_deref(), Some(HOST));
}

#[tokio::test]
async fn test_unknown_status_after_retry_propagates() {
    let (manager, transport, _store) = setup(
        ScriptedTransport::new(|request| match (request.path(), request.header("authorization")) {
            (GET_NEW_TOKEN, _) => new_token(),
            (SAVE_NEW_TOKEN, _) => ok(r#"{"response":{}}"#),
            (_, Some("Bearer a1")) => unauthorized("session_expired"),
            _ => Ok(HttpOutcome::new(403, "forbidden")),
        }),
        true,
    );

    let err = manager.execute::<serde_json::Value>(&business()).await.unwrap_err();

    assert_eq!(err.status().map(|s| s.as_u16()), Some(403));
    assert_eq!(err.raw_response(), Some("forbidden"));
    assert_eq!(transport.count(BUSINESS), 2);
}

#[tokio::test]
async fn test_refresh_transport_failure_is_retryable() {
    let (manager, transport, store) = setup(
        ScriptedTransport::new(|request| match request.path() {
            GET_NEW_TOKEN => Err(TransportError::Network("connection reset".into())),
            _ => ok(r#"{"response":{}}"#),
        }),
        false,
    );

    let err = manager.execute::<serde_json::Value>(&business()).await.unwrap_err();

    assert!(matches!(err, Error::Refresh(RefreshError::Transport(_))));
    assert!(err.is_retryable());
    assert_eq!(transport.count(BUSINESS), 0);
    assert_eq!(store.get(StorageKey::AccessToken).as_deref(), Some("a1"));
}

#[tokio::test]
async fn test_invalid_credentials_are_not_retried() {
    let (manager, transport, _store) = setup(
        ScriptedTransport::new(|_| unauthorized("invalid_token_malformed")),
        true,
    );

    let err = manager.execute::<serde_json::Value>(&business()).await.unwrap_err();

    assert!(matches!(err, Error::InvalidCredentials { .. }));
    assert_eq!(transport.count(BUSINESS), 1);
    assert_eq!(transport.count(GET_NEW_TOKEN), 0);
}

#[tokio::test]
async fn test_deadline_cancels_in_flight_call() {
    let (manager, _transport, store) = setup(
        ScriptedTransport::new(|_| ok(r#"{"response":{}}"#))
            .with_latency(Duration::from_millis(200)),
        true,
    );

    let err = manager
        .execute_with_deadline::<serde_json::Value>(&business(), Duration::from_millis(20))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Transport(TransportError::Cancelled)));
    assert!(store.load_session().unwrap().credentials.valid);
}
