//! Capability resource operations (§4.8, §6): define capabilities and grant
//! or revoke them on agents.
//!
//! Grounded on `original_source/.../routers/capabilities.py`, including the
//! self-elevation guard: an agent may not modify its own capability grants.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthContext;
use crate::error::Error;
use crate::server::{client_ip, AppState};
use crate::validation;
use crate::{audit, validation::validate_nonempty_len};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/capabilities", post(create_capability).get(list_capabilities))
        .route(
            "/agents/{id}/capabilities",
            get(list_agent_capabilities).post(grant_capability),
        )
        .route(
            "/agents/{id}/capabilities/{cid}",
            axum::routing::delete(revoke_capability),
        )
}

#[derive(Debug, Deserialize)]
struct CreateCapabilityRequest {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GrantCapabilityRequest {
    capability_id: String,
}

async fn create_capability(
    State(state): State<AppState>,
    headers: HeaderMap,
    ctx: AuthContext,
    Json(body): Json<CreateCapabilityRequest>,
) -> Result<impl IntoResponse, Error> {
    ctx.require("admin:*")?;
    validate_nonempty_len("name", &body.name, 128)?;

    let capability = state
        .store
        .create_capability(&body.name, body.description.clone())
        .await
        .map_err(Error::from)?;

    audit::log(
        state.store.as_ref(),
        "capability.created",
        Some(&ctx.agent_id),
        Some("capability"),
        Some(&capability.id),
        Some(json!({ "name": capability.name })),
        Some(&client_ip(&headers)),
        true,
    )
    .await;

    Ok((StatusCode::CREATED, Json(capability)))
}

async fn list_capabilities(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> Result<impl IntoResponse, Error> {
    ctx.require("agents:read")?;
    Ok(Json(state.store.list_capabilities().await))
}

async fn list_agent_capabilities(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(agent_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    ctx.require("agents:read")?;
    state.store.get_agent(&agent_id).await.map_err(Error::from)?;
    Ok(Json(state.store.agent_capability_names(&agent_id).await))
}

async fn grant_capability(
    State(state): State<AppState>,
    headers: HeaderMap,
    ctx: AuthContext,
    Path(agent_id): Path<String>,
    Json(body): Json<GrantCapabilityRequest>,
) -> Result<impl IntoResponse, Error> {
    ctx.require("admin:*")?;
    if ctx.agent_id == agent_id {
        return Err(Error::Precondition(
            "an agent cannot modify its own capabilities".to_string(),
        ));
    }
    validation::validate_max_len("capability_id", &body.capability_id, 128)?;

    state.store.get_agent(&agent_id).await.map_err(Error::from)?;
    let capability = state
        .store
        .get_capability(&body.capability_id)
        .await
        .map_err(Error::from)?;

    let grant = state
        .store
        .grant_capability(&agent_id, &body.capability_id, Some(ctx.agent_id.clone()))
        .await
        .map_err(Error::from)?;

    audit::log(
        state.store.as_ref(),
        "capability.granted",
        Some(&ctx.agent_id),
        Some("agent_capability"),
        Some(&grant.id),
        Some(json!({ "target_agent": agent_id, "capability_id": body.capability_id })),
        Some(&client_ip(&headers)),
        true,
    )
    .await;

    // Spec §6: 201 response body is the Capability, not the grant relation row.
    Ok((StatusCode::CREATED, Json(capability)))
}

async fn revoke_capability(
    State(state): State<AppState>,
    headers: HeaderMap,
    ctx: AuthContext,
    Path((agent_id, capability_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, Error> {
    ctx.require("admin:*")?;
    if ctx.agent_id == agent_id {
        return Err(Error::Precondition(
            "an agent cannot modify its own capabilities".to_string(),
        ));
    }

    state
        .store
        .revoke_capability(&agent_id, &capability_id)
        .await
        .map_err(Error::from)?;

    audit::log(
        state.store.as_ref(),
        "capability.revoked",
        Some(&ctx.agent_id),
        Some("agent_capability"),
        None,
        Some(json!({ "target_agent": agent_id, "capability_id": capability_id })),
        Some(&client_ip(&headers)),
        true,
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
