//! Resource operations (§4.8): the public HTTP surface over agents, API
//! keys, capabilities, and the audit log, plus the token-issuance pipeline.
//!
//! Grounded on `key_server/handler.rs`'s route-builder-returning-a-`Router`
//! shape; exact precondition ordering, self-action guards, and audit detail
//! payloads come from `original_source/.../routers/{agents,api_keys,
//! capabilities,audit}.py`.

pub mod agents;
pub mod audit;
pub mod auth_token;
pub mod capabilities;
pub mod keys;

use axum::Router;

use crate::server::AppState;

/// All resource-operation routes, merged into one router mounted by
/// [`crate::server::create_router`].
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(auth_token::routes())
        .merge(agents::routes())
        .merge(keys::routes())
        .merge(capabilities::routes())
        .merge(audit::routes())
}
