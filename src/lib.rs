//! Agent Identity Management Service
//!
//! Machine identity lifecycle management for autonomous agents: agent
//! registration, API key issuance and rotation, capability-based
//! authorization, and an append-only audit trail.
//!
//! # Features
//!
//! - **Agent lifecycle**: register, suspend, reactivate, revoke, delete
//! - **API keys**: hashed at rest, rotated with a grace period, exchanged for
//!   short-lived bearer tokens
//! - **Capabilities**: named permission atoms granted per-agent, with an
//!   `admin:*` wildcard
//! - **Audit log**: every security-relevant event, queryable by agent,
//!   action, resource, and time range
//! - **Rate limiting**: per-IP sliding-window buckets on the auth and
//!   general API surfaces

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
pub mod auth;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod rate_limit;
pub mod server;
pub mod store;
pub mod token;
pub mod validation;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
