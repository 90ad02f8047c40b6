//! Bootstrap demo: creates the default capability set, an `admin` agent with
//! every capability granted, and that agent's first API key, then serves
//! the resulting in-memory store so the printed key is immediately usable.
//!
//! Run with: cargo run --bin aims-seed
//!
//! Mirrors the original bootstrap script's default capability table and
//! banner output; unlike it, this process owns the store for its own
//! lifetime rather than writing to a persistent database, since AIMS's
//! persistence engine is an external collaborator here stood in for by
//! [`aims::store::memory::InMemoryStore`].

use std::sync::Arc;

use aims::config::Config;
use aims::credentials::{generate_api_key, hash_api_key, key_prefix};
use aims::rate_limit::RateLimiter;
use aims::server::{create_router, AppState};
use aims::store::memory::InMemoryStore;
use aims::store::{AgentType, Store};
use tokio::net::TcpListener;
use tracing::info;

const DEFAULT_CAPABILITIES: &[(&str, &str)] = &[
    ("agents:read", "Read agent information"),
    ("agents:write", "Create and update agents"),
    ("keys:manage", "Create, rotate, and revoke API keys"),
    ("audit:read", "Query the audit log"),
    ("admin:*", "Full administrative access"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    aims::setup_tracing("info", None)?;

    let config = Config::load(None)?;
    let store = InMemoryStore::new();

    let mut capabilities = Vec::with_capacity(DEFAULT_CAPABILITIES.len());
    for (name, description) in DEFAULT_CAPABILITIES {
        let capability = store
            .create_capability(name, Some((*description).to_string()))
            .await?;
        capabilities.push(capability);
    }

    let admin = store
        .create_agent(
            "admin",
            Some("System administrator agent".to_string()),
            "system",
            AgentType::Orchestrator,
            None,
        )
        .await?;

    for capability in &capabilities {
        store
            .grant_capability(&admin.id, &capability.id, Some("system".to_string()))
            .await?;
    }

    let raw_key = generate_api_key(&config.api_key_prefix);
    let key_hash = hash_api_key(&raw_key);
    let prefix = key_prefix(&raw_key);
    store
        .create_api_key(&admin.id, "admin-bootstrap", &key_hash, &prefix, None)
        .await?;

    println!("{}", "=".repeat(60));
    println!("AIMS Bootstrap Complete");
    println!("{}", "=".repeat(60));
    println!("Admin Agent ID: {}", admin.id);
    println!("Admin API Key:  {raw_key}");
    println!();
    println!("SAVE THIS KEY - it will not be shown again!");
    println!("{}", "=".repeat(60));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "Serving seeded store");

    let state = AppState {
        config: Arc::new(config),
        store: Arc::new(store),
        rate_limiter: Arc::new(RateLimiter::new()),
    };
    axum::serve(listener, create_router(state)).await?;

    Ok(())
}
