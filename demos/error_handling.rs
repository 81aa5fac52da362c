//! Example demonstrating error handling for authenticated calls.
//!
//! This example shows how to:
//! - Tell rejected credentials apart from other login failures
//! - Detect errors that require the user to log in again
//! - Show `user_message()` to end users
//! - Check if errors are retryable
//! - React to an invalidated session through a listener
//!
//! Point it at a running list service through `NEWBCOOK_HOST`.
//!
//! Run with: `cargo run --example error_handling`

use newbcook_sdk::{
    BackendApi, CredentialStore, Endpoint, Error, HttpMethod, MemoryStore, NetworkManager,
    ReqwestTransport, StorageKey, TransportError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn report(error: &Error) {
    println!("  Error: {}", error);
    println!("  User message: {}", error.user_message());
    println!("  Requires login: {}", error.requires_login());
    println!("  Is retryable: {}", error.is_retryable());
    if let Some(status) = error.status() {
        println!("  Status: {}", status);
    }
    if let Some(raw) = error.raw_response() {
        println!("  Raw response: {}", raw);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("newbcook_sdk=info")
        .init();

    let hostname =
        std::env::var("NEWBCOOK_HOST").unwrap_or_else(|_| "localhost:8080".to_string());

    let invalidated = Arc::new(AtomicUsize::new(0));
    let invalidated_clone = invalidated.clone();
    let store = Arc::new(MemoryStore::new());
    let manager = NetworkManager::builder()
        .transport(Arc::new(ReqwestTransport::new()?))
        .store(store.clone())
        .session_listener(Arc::new(move || {
            invalidated_clone.fetch_add(1, Ordering::SeqCst);
        }))
        .build()?;
    let api = BackendApi::new(manager.clone());

    println!("=== Example 1: Calling Without a Session ===");
    match api.list_names().await {
        Ok(lists) => println!("Unexpected success: {} lists", lists.len()),
        Err(e) if e.requires_login() => {
            println!("Nobody is logged in yet");
            report(&e);
        }
        Err(e) => report(&e),
    }
    println!();

    println!("=== Example 2: Rejected Credentials ===");
    match api.login(&hostname, "nobody", "wrong-password").await {
        Ok(_) => println!("Unexpected success"),
        Err(Error::InvalidCredentials { reason }) => {
            println!("Credentials rejected, reason: {:?}", reason);
        }
        Err(e) => report(&e),
    }
    println!();

    println!("=== Example 3: A Session the Server No Longer Accepts ===");
    // Pretend a previous run left a token behind that the server has revoked
    let revoked = Arc::new(MemoryStore::with_session(&hostname, "revoked", "revoked", true));
    let revoked_api = BackendApi::new(
        NetworkManager::builder()
            .transport(Arc::new(ReqwestTransport::new()?))
            .store(revoked)
            .session_listener(Arc::new(|| println!("  Listener: routing to login")))
            .build()?,
    );
    match revoked_api.list_names().await {
        Ok(_) => println!("Unexpected success"),
        Err(Error::AuthInvalid) => {
            println!("Session invalidated, stored credentials were cleared");
            println!("  Authenticated afterwards: {}", revoked_api.is_authenticated());
        }
        Err(Error::AuthExpired) => println!("Token expired even after a refresh"),
        Err(e) => report(&e),
    }
    println!();

    println!("=== Example 4: Unreachable Server ===");
    store.set_all(&[
        (StorageKey::Hostname, "127.0.0.1:1"),
        (StorageKey::AccessToken, "a"),
        (StorageKey::RefreshToken, "r"),
        (StorageKey::TokenValid, "true"),
    ]);
    match api.list_names().await {
        Ok(_) => println!("Unexpected success"),
        Err(e @ Error::Transport(TransportError::Network(_))) => {
            println!("Network failure, safe to retry later");
            report(&e);
        }
        Err(e) => report(&e),
    }
    println!();

    println!("=== Example 5: Giving Up at a Deadline ===");
    let endpoint = Endpoint::without_payload(HttpMethod::Get, "retrieve_list_names");
    match manager
        .execute_with_deadline::<serde_json::Value>(&endpoint, Duration::from_millis(1))
        .await
    {
        Ok(_) => println!("Finished within the deadline"),
        Err(Error::Transport(TransportError::Cancelled)) => println!("Call cancelled at deadline"),
        Err(e) => report(&e),
    }
    println!();

    println!(
        "Session listener fired {} time(s) for the main manager",
        invalidated.load(Ordering::SeqCst)
    );

    Ok(())
}
