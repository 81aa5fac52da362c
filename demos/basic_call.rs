//! Basic example demonstrating login and an authenticated call.
//!
//! This example shows how to:
//! - Build a network manager with a transport and credential store
//! - Log in through `BackendApi`
//! - Fetch the user's list names
//! - Inspect call metadata such as latency, attempts and refreshes
//!
//! Point it at a running list service through `NEWBCOOK_HOST`,
//! `NEWBCOOK_USER` and `NEWBCOOK_PASSWORD`.
//!
//! Run with: `cargo run --example basic_call`

use newbcook_sdk::{
    BackendApi, Endpoint, Error, HttpMethod, MemoryStore, NetworkManager, ReqwestTransport,
};
use std::sync::Arc;
use std::time::Duration;

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("newbcook_sdk=debug,basic_call=info")
        .init();

    let hostname = env_or("NEWBCOOK_HOST", "localhost:8080");
    let username = env_or("NEWBCOOK_USER", "alice");
    let password = env_or("NEWBCOOK_PASSWORD", "secret");

    let manager = NetworkManager::builder()
        .transport(Arc::new(ReqwestTransport::new()?))
        .store(Arc::new(MemoryStore::new()))
        .default_timeout(Duration::from_secs(5))
        .session_listener(Arc::new(|| println!("Session ended, please log in again")))
        .build()?;
    let api = BackendApi::new(manager);

    println!("=== Login ===");
    api.login(&hostname, &username, &password).await?;
    println!("Logged in as {} at {}", username, hostname);
    println!("Authenticated: {}", api.is_authenticated());
    println!();

    println!("=== List Names ===");
    let lists = api.list_names().await?;
    if lists.is_empty() {
        println!("No lists yet");
    }
    for list in &lists {
        println!("{} (id {})", list.list_name, list.list_id);
    }
    println!();

    println!("=== Accessing Call Metadata ===");
    // The same call through the manager keeps the response details
    let endpoint = Endpoint::without_payload(HttpMethod::Get, "retrieve_list_names");
    let response = api.manager().execute::<serde_json::Value>(&endpoint).await?;
    println!("Status code: {}", response.status);
    println!("Request latency: {:?}", response.latency);
    println!("Attempts: {}", response.attempts);
    println!("Was retried: {}", response.was_retried());
    println!("Was refreshed: {}", response.was_refreshed());
    println!("Raw response length: {} bytes", response.raw_body.len());

    api.logout();
    println!();
    println!("Logged out, authenticated: {}", api.is_authenticated());

    Ok(())
}
