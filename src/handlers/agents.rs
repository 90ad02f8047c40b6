//! Agent resource operations (§4.8, §6): create/list/get/patch, plus the
//! lifecycle endpoints (suspend/reactivate/revoke/delete) delegated to
//! [`crate::lifecycle`].
//!
//! Grounded on `original_source/.../routers/agents.py` for precondition
//! ordering and audit detail payloads.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthContext;
use crate::error::Error;
use crate::lifecycle;
use crate::server::{client_ip, AppState};
use crate::store::{Agent, AgentFilter, AgentPatch};
use crate::validation;
use crate::{audit, lifecycle::LifecycleError};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/agents", post(create_agent).get(list_agents))
        .route("/agents/{id}", get(get_agent).patch(patch_agent).delete(delete_agent))
        .route("/agents/{id}/suspend", post(suspend_agent))
        .route("/agents/{id}/reactivate", post(reactivate_agent))
        .route("/agents/{id}/revoke", post(revoke_agent))
}

#[derive(Debug, Deserialize)]
struct CreateAgentRequest {
    name: String,
    #[serde(default)]
    description: Option<String>,
    owner: String,
    #[serde(default = "default_agent_type")]
    agent_type: String,
    #[serde(default = "default_metadata_json")]
    metadata_json: String,
}

fn default_agent_type() -> String {
    "custom".to_string()
}

fn default_metadata_json() -> String {
    "{}".to_string()
}

#[derive(Debug, Default, Deserialize)]
struct PatchAgentRequest {
    description: Option<String>,
    owner: Option<String>,
    metadata_json: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentListQuery {
    status: Option<String>,
    owner: Option<String>,
    agent_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ReasonBody {
    #[serde(default = "default_reason")]
    reason: String,
}

fn default_reason() -> String {
    "No reason provided".to_string()
}

async fn create_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    ctx: AuthContext,
    Json(body): Json<CreateAgentRequest>,
) -> Result<impl IntoResponse, Error> {
    ctx.require("agents:write")?;
    validation::validate_agent_name(&body.name)?;
    validation::validate_nonempty_len("owner", &body.owner, 128)?;
    let agent_type = validation::validate_agent_type(&body.agent_type)?;

    let agent = state
        .store
        .create_agent(
            &body.name,
            body.description.clone(),
            &body.owner,
            agent_type,
            Some(body.metadata_json.clone()),
        )
        .await
        .map_err(Error::from)?;

    audit::log(
        state.store.as_ref(),
        "agent.created",
        Some(&ctx.agent_id),
        Some("agent"),
        Some(&agent.id),
        Some(json!({ "name": agent.name, "owner": agent.owner })),
        Some(&client_ip(&headers)),
        true,
    )
    .await;

    Ok((StatusCode::CREATED, Json(agent)))
}

async fn list_agents(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<AgentListQuery>,
) -> Result<impl IntoResponse, Error> {
    ctx.require("agents:read")?;
    let filter = AgentFilter {
        status: query.status.as_deref().and_then(parse_status),
        owner: query.owner,
        agent_type: query
            .agent_type
            .as_deref()
            .and_then(crate::store::AgentType::parse),
    };
    let agents = state.store.list_agents(&filter).await;
    Ok(Json(agents))
}

fn parse_status(s: &str) -> Option<crate::store::AgentStatus> {
    use crate::store::AgentStatus;
    match s {
        "active" => Some(AgentStatus::Active),
        "suspended" => Some(AgentStatus::Suspended),
        "revoked" => Some(AgentStatus::Revoked),
        _ => None,
    }
}

async fn get_agent(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<Agent>, Error> {
    ctx.require("agents:read")?;
    let agent = state.store.get_agent(&id).await.map_err(Error::from)?;
    Ok(Json(agent))
}

async fn patch_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    ctx: AuthContext,
    Path(id): Path<String>,
    Json(body): Json<PatchAgentRequest>,
) -> Result<impl IntoResponse, Error> {
    ctx.require("agents:write")?;
    if let Some(owner) = &body.owner {
        validation::validate_nonempty_len("owner", owner, 128)?;
    }
    let updated_fields: Vec<&str> = [
        body.description.is_some().then_some("description"),
        body.owner.is_some().then_some("owner"),
        body.metadata_json.is_some().then_some("metadata_json"),
    ]
    .into_iter()
    .flatten()
    .collect();

    let patch = AgentPatch {
        description: body.description.map(Some),
        owner: body.owner,
        metadata_json: body.metadata_json,
    };
    let agent = state.store.patch_agent(&id, patch).await.map_err(Error::from)?;

    audit::log(
        state.store.as_ref(),
        "agent.updated",
        Some(&ctx.agent_id),
        Some("agent"),
        Some(&agent.id),
        Some(json!({ "updated_fields": updated_fields })),
        Some(&client_ip(&headers)),
        true,
    )
    .await;

    Ok(Json(agent))
}

async fn suspend_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    ctx: AuthContext,
    Path(id): Path<String>,
    Json(body): Json<ReasonBody>,
) -> Result<impl IntoResponse, Error> {
    ctx.require("admin:*")?;
    let agent = lifecycle::suspend_agent(state.store.as_ref(), &ctx.agent_id, &id)
        .await
        .map_err(map_lifecycle_error)?;

    audit::log(
        state.store.as_ref(),
        "agent.suspended",
        Some(&ctx.agent_id),
        Some("agent"),
        Some(&agent.id),
        Some(json!({ "reason": body.reason })),
        Some(&client_ip(&headers)),
        true,
    )
    .await;

    Ok(Json(agent))
}

async fn reactivate_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    ctx: AuthContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    ctx.require("admin:*")?;
    let agent = lifecycle::reactivate_agent(state.store.as_ref(), &id)
        .await
        .map_err(map_lifecycle_error)?;

    audit::log(
        state.store.as_ref(),
        "agent.reactivated",
        Some(&ctx.agent_id),
        Some("agent"),
        Some(&agent.id),
        None,
        Some(&client_ip(&headers)),
        true,
    )
    .await;

    Ok(Json(agent))
}

async fn revoke_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    ctx: AuthContext,
    Path(id): Path<String>,
    Json(body): Json<ReasonBody>,
) -> Result<impl IntoResponse, Error> {
    ctx.require("admin:*")?;
    let (agent, _cascaded) = lifecycle::revoke_agent(state.store.as_ref(), &ctx.agent_id, &id)
        .await
        .map_err(map_lifecycle_error)?;

    // Open question (spec §9): cascade revokes keys silently — one
    // `agent.revoked` row only, no per-key audit rows.
    audit::log(
        state.store.as_ref(),
        "agent.revoked",
        Some(&ctx.agent_id),
        Some("agent"),
        Some(&agent.id),
        Some(json!({ "reason": body.reason })),
        Some(&client_ip(&headers)),
        true,
    )
    .await;

    Ok(Json(agent))
}

async fn delete_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    ctx: AuthContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    ctx.require("admin:*")?;
    let agent = state.store.get_agent(&id).await.map_err(Error::from)?;
    lifecycle::delete_agent(state.store.as_ref(), &ctx.agent_id, &id)
        .await
        .map_err(map_lifecycle_error)?;

    audit::log(
        state.store.as_ref(),
        "agent.deleted",
        Some(&ctx.agent_id),
        Some("agent"),
        Some(&id),
        Some(json!({ "name": agent.name })),
        Some(&client_ip(&headers)),
        true,
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

fn map_lifecycle_error(e: LifecycleError) -> Error {
    e.into()
}
