//! Authorization gate (§4.5). Every resource operation except token
//! exchange and the health check requires a valid bearer token and a
//! specific capability.
//!
//! Implemented as an axum extractor rather than global middleware (unlike
//! the teacher's `auth_middleware`) because the required capability differs
//! per route/method (§4.8) and an extractor lets each handler name its own
//! requirement inline: `let ctx = AuthContext::extract(...); ctx.require("agents:write")?;`

use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;

use crate::error::Error;
use crate::server::AppState;
use crate::token::{self, Claims};

/// The `admin:*` capability grants access to every gated operation.
pub const ADMIN_WILDCARD: &str = "admin:*";

/// The authenticated principal for the current request: the agent's id and
/// the capability scopes frozen into its bearer token at mint time.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub agent_id: String,
    pub scopes: Vec<String>,
}

impl From<Claims> for AuthContext {
    fn from(claims: Claims) -> Self {
        Self {
            agent_id: claims.sub,
            scopes: claims.scopes,
        }
    }
}

impl AuthContext {
    /// Succeeds if the context carries `capability` or the `admin:*`
    /// wildcard; otherwise a 403 with the missing-capability detail (§4.5).
    pub fn require(&self, capability: &str) -> Result<(), Error> {
        if self.scopes.iter().any(|s| s == ADMIN_WILDCARD || s == capability) {
            Ok(())
        } else {
            Err(Error::Authorization(format!(
                "Missing required capability: {capability}"
            )))
        }
    }
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let State(state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|_| Error::Internal)?;
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::Authentication("Missing Authorization header".to_string()))?;
        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or_else(|| Error::Authentication("Authorization header must be a Bearer token".to_string()))?;
        let claims = token::verify(&state.config.jwt_secret_key, &state.config.jwt_algorithm, token)
            .map_err(|_| Error::Authentication("Invalid or expired token".to_string()))?;
        Ok(claims.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(scopes: &[&str]) -> AuthContext {
        AuthContext {
            agent_id: "agent-1".to_string(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn admin_wildcard_bypasses_any_requirement() {
        assert!(ctx(&[ADMIN_WILDCARD]).require("agents:write").is_ok());
    }

    #[test]
    fn exact_capability_match_allows() {
        assert!(ctx(&["agents:write"]).require("agents:write").is_ok());
    }

    #[test]
    fn missing_capability_is_forbidden_with_detail() {
        let err = ctx(&["agents:read"]).require("agents:write").unwrap_err();
        match err {
            Error::Authorization(detail) => assert_eq!(detail, "Missing required capability: agents:write"),
            other => panic!("expected Authorization error, got {other:?}"),
        }
    }
}
