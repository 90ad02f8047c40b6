//! API key resource operations (§4.8, §6): create, list, rotate, revoke.
//!
//! Grounded on `original_source/.../routers/api_keys.py` for precondition
//! ordering and response shapes (`raw_key` returned only once, on
//! creation/rotation).

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::AuthContext;
use crate::credentials::{generate_api_key, hash_api_key, key_prefix};
use crate::error::Error;
use crate::lifecycle;
use crate::server::{client_ip, AppState};
use crate::store::ApiKey;
use crate::{audit, validation};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/agents/{id}/keys", post(create_key).get(list_keys))
        .route("/agents/{id}/keys/{kid}/rotate", post(rotate_key))
        .route("/agents/{id}/keys/{kid}", axum::routing::delete(revoke_key))
}

#[derive(Debug, Deserialize)]
struct CreateKeyRequest {
    #[serde(default = "default_key_name")]
    name: String,
    expires_at: Option<String>,
}

fn default_key_name() -> String {
    "default".to_string()
}

/// Response shape that reveals the raw key exactly once, at creation or
/// rotation (§4.8: "response never includes raw key" on every other route).
#[derive(Debug, Serialize)]
struct ApiKeyCreated {
    id: String,
    agent_id: String,
    key_prefix: String,
    name: String,
    raw_key: String,
    status: &'static str,
    expires_at: Option<String>,
    created_at: String,
}

impl ApiKeyCreated {
    fn new(key: &ApiKey, raw_key: String) -> Self {
        Self {
            id: key.id.clone(),
            agent_id: key.agent_id.clone(),
            key_prefix: key.key_prefix.clone(),
            name: key.name.clone(),
            raw_key,
            status: "active",
            expires_at: key.expires_at.clone(),
            created_at: key.created_at.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct KeyRotationResponse {
    old_key_id: String,
    new_key: ApiKeyCreated,
    grace_period_hours: i64,
}

async fn create_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    ctx: AuthContext,
    Path(agent_id): Path<String>,
    Json(body): Json<CreateKeyRequest>,
) -> Result<impl IntoResponse, Error> {
    ctx.require("keys:manage")?;
    validation::validate_max_len("name", &body.name, 128)?;
    state.store.get_agent(&agent_id).await.map_err(Error::from)?;

    let raw_key = generate_api_key(&state.config.api_key_prefix);
    let hash = hash_api_key(&raw_key);
    let prefix = key_prefix(&raw_key);

    let key = state
        .store
        .create_api_key(&agent_id, &body.name, &hash, &prefix, body.expires_at.clone())
        .await
        .map_err(Error::from)?;

    audit::log(
        state.store.as_ref(),
        "key.created",
        Some(&ctx.agent_id),
        Some("api_key"),
        Some(&key.id),
        Some(json!({ "target_agent": agent_id, "key_name": key.name })),
        Some(&client_ip(&headers)),
        true,
    )
    .await;

    Ok((StatusCode::CREATED, Json(ApiKeyCreated::new(&key, raw_key))))
}

async fn list_keys(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(agent_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    ctx.require("keys:manage")?;
    state.store.get_agent(&agent_id).await.map_err(Error::from)?;
    let keys = state.store.list_api_keys(&agent_id).await;
    Ok(Json(keys))
}

async fn rotate_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    ctx: AuthContext,
    Path((agent_id, key_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, Error> {
    ctx.require("keys:manage")?;
    state.store.get_agent(&agent_id).await.map_err(Error::from)?;
    let existing = state.store.get_api_key(&key_id).await.map_err(Error::from)?;
    if existing.agent_id != agent_id {
        return Err(Error::NotFound("API key not found".to_string()));
    }

    let raw_key = generate_api_key(&state.config.api_key_prefix);
    let hash = hash_api_key(&raw_key);
    let prefix = key_prefix(&raw_key);

    let (old, new) = lifecycle::rotate_api_key(state.store.as_ref(), &key_id, &hash, &prefix)
        .await
        .map_err(Error::from)?;

    audit::log(
        state.store.as_ref(),
        "key.rotated",
        Some(&ctx.agent_id),
        Some("api_key"),
        Some(&old.id),
        Some(json!({ "old_key_id": old.id, "new_key_id": new.id })),
        Some(&client_ip(&headers)),
        true,
    )
    .await;

    Ok(Json(KeyRotationResponse {
        old_key_id: old.id,
        new_key: ApiKeyCreated::new(&new, raw_key),
        grace_period_hours: state.config.key_rotation_grace_hours,
    }))
}

async fn revoke_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    ctx: AuthContext,
    Path((agent_id, key_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, Error> {
    ctx.require("keys:manage")?;
    state.store.get_agent(&agent_id).await.map_err(Error::from)?;
    let existing = state.store.get_api_key(&key_id).await.map_err(Error::from)?;
    if existing.agent_id != agent_id {
        return Err(Error::NotFound("API key not found".to_string()));
    }

    lifecycle::revoke_api_key(state.store.as_ref(), &key_id)
        .await
        .map_err(Error::from)?;

    audit::log(
        state.store.as_ref(),
        "key.revoked",
        Some(&ctx.agent_id),
        Some("api_key"),
        Some(&key_id),
        Some(json!({ "target_agent": agent_id })),
        Some(&client_ip(&headers)),
        true,
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
