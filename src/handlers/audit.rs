//! Audit log query endpoint (§4.8, §4.6, §6).
//!
//! Grounded on `original_source/.../routers/audit.py` for the accepted
//! filters and the default/maximum page size enforced by
//! [`crate::audit::query`].

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::auth::AuthContext;
use crate::error::Error;
use crate::server::AppState;
use crate::store::AuditFilter;

pub fn routes() -> Router<AppState> {
    Router::new().route("/audit", get(list_audit))
}

#[derive(Debug, Default, Deserialize)]
struct AuditQuery {
    agent_id: Option<String>,
    action: Option<String>,
    resource_type: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    #[serde(default)]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

async fn list_audit(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<AuditQuery>,
) -> Result<impl IntoResponse, Error> {
    ctx.require("audit:read")?;

    let filter = AuditFilter {
        agent_id: query.agent_id,
        action: query.action,
        resource_type: query.resource_type,
        start_date: query.start_date,
        end_date: query.end_date,
        limit: query.limit,
        offset: query.offset,
    };

    let rows = crate::audit::query(state.store.as_ref(), filter).await;
    Ok(Json(rows))
}
