//! Token issuance pipeline (§4.4 "Token Issuance Pipeline", §6 `POST
//! /auth/token`): the ordered hash-lookup → key-state → grace → expiry →
//! agent-state → scope-gather → stamp → mint → audit workflow.
//!
//! Grounded on `key_server/handler.rs::exchange_token`'s handler shape
//! (extract client IP, validate, build response, emit audit) with the exact
//! ordered checks taken from `original_source/.../routers/auth.py`.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json};
use axum::routing::post;
use axum::Router;
use serde::Serialize;
use serde_json::json;

use crate::credentials::hash_api_key;
use crate::error::Error;
use crate::lifecycle::within_rotation_grace;
use crate::server::{client_ip, AppState};
use crate::store::{AgentStatus, ApiKeyStatus};
use crate::{audit, token};

pub fn routes() -> Router<AppState> {
    Router::new().route("/auth/token", post(exchange_token))
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    access_token: String,
    token_type: &'static str,
    expires_in: i64,
}

/// `POST /auth/token`. Unauthenticated — this endpoint IS the
/// authentication step, so it is exempt from the [`crate::auth`] gate and
/// from the per-operation audit trailer (it audits itself at every step,
/// §4.4).
async fn exchange_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, Error> {
    let ip = client_ip(&headers);
    let raw_key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::Authentication("Missing X-API-Key header".to_string()))?;

    async fn fail(
        store: &dyn crate::store::Store,
        ip: &str,
        agent_id: Option<&str>,
        reason: &str,
        error: Error,
    ) -> Error {
        audit::log(
            store,
            "auth.failed",
            agent_id,
            None,
            None,
            Some(json!({ "reason": reason })),
            Some(ip),
            false,
        )
        .await;
        error
    }

    // 1. Hash lookup.
    let key_hash = hash_api_key(raw_key);
    let Some(api_key) = state.store.get_api_key_by_hash(&key_hash).await else {
        return Err(fail(
            state.store.as_ref(),
            &ip,
            None,
            "invalid_key",
            Error::Authentication("Invalid API key".to_string()),
        )
        .await);
    };

    // 2. Key-state check: revoked is terminal.
    if api_key.status == ApiKeyStatus::Revoked {
        return Err(fail(
            state.store.as_ref(),
            &ip,
            Some(&api_key.agent_id),
            "key_revoked",
            Error::Authentication("API key has been revoked".to_string()),
        )
        .await);
    }

    // 3. Grace check for rotated keys.
    if api_key.status == ApiKeyStatus::Rotated {
        let still_valid = api_key
            .rotated_at
            .as_deref()
            .is_some_and(|rotated_at| {
                within_rotation_grace(
                    rotated_at,
                    chrono::Utc::now(),
                    state.config.key_rotation_grace_hours,
                )
            });
        if !still_valid {
            return Err(fail(
                state.store.as_ref(),
                &ip,
                Some(&api_key.agent_id),
                "rotated_key_expired",
                Error::Authentication("Rotated API key has expired past grace period".to_string()),
            )
            .await);
        }
    }

    // 4. Expiry check.
    if let Some(expires_at) = &api_key.expires_at {
        let expired = chrono::DateTime::parse_from_rfc3339(expires_at)
            .map(|exp| chrono::Utc::now() > exp.with_timezone(&chrono::Utc))
            .unwrap_or(false);
        if expired {
            return Err(fail(
                state.store.as_ref(),
                &ip,
                Some(&api_key.agent_id),
                "key_expired",
                Error::Authentication("API key has expired".to_string()),
            )
            .await);
        }
    }

    // 5. Agent-state check.
    let agent = state
        .store
        .get_agent(&api_key.agent_id)
        .await
        .map_err(Error::from)?;
    if agent.status == AgentStatus::Suspended {
        return Err(fail(
            state.store.as_ref(),
            &ip,
            Some(&agent.id),
            "agent_suspended",
            Error::Authorization("Agent is suspended".to_string()),
        )
        .await);
    }
    if agent.status == AgentStatus::Revoked {
        return Err(fail(
            state.store.as_ref(),
            &ip,
            Some(&agent.id),
            "agent_revoked",
            Error::Authorization("Agent has been revoked".to_string()),
        )
        .await);
    }

    // 6. Gather capability names.
    let scopes = state.store.agent_capability_names(&agent.id).await;

    // 7. Stamp last-used.
    let _ = state.store.touch_api_key_last_used(&api_key.id).await;

    // 8. Mint.
    let (access_token, expires_in) = token::mint(
        &state.config.jwt_secret_key,
        &state.config.jwt_algorithm,
        &agent.id,
        &scopes,
        state.config.jwt_expiration_minutes,
    )
    .map_err(|_| Error::Internal)?;

    // 9. Audit success.
    audit::log(
        state.store.as_ref(),
        "auth.token_issued",
        Some(&agent.id),
        Some("api_key"),
        Some(&api_key.id),
        None,
        Some(&ip),
        true,
    )
    .await;

    // 10. Respond.
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
        expires_in,
    }))
}
