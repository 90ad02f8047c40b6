//! The error taxonomy of spec §7, mapped to HTTP statuses and a
//! `{"detail": ...}` JSON body. Shape follows the teacher's `error.rs`
//! (`thiserror::Error` derive, a `pub type Result<T>` alias), re-targeted
//! from JSON-RPC error codes to HTTP statuses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

/// Result type alias for AIMS.
pub type Result<T> = std::result::Result<T, Error>;

/// AIMS errors, one variant per row of spec §7's taxonomy.
#[derive(Error, Debug)]
pub enum Error {
    /// Request body/query failed schema or domain validation.
    #[error("validation error: {0}")]
    Validation(String),
    /// Missing, malformed, or invalid/expired credential.
    #[error("authentication error: {0}")]
    Authentication(String),
    /// Valid credential, insufficient capability.
    #[error("authorization error: {0}")]
    Authorization(String),
    /// No row matched the requested id or unique field.
    #[error("not found: {0}")]
    NotFound(String),
    /// A unique constraint would be violated.
    #[error("conflict: {0}")]
    Conflict(String),
    /// A lifecycle guard rejected the operation (e.g. self-revoke).
    #[error("precondition failed: {0}")]
    Precondition(String),
    /// The caller exceeded its rate limit bucket.
    #[error("rate limited")]
    RateLimited,
    /// Unexpected internal failure; never echoed to the client.
    #[error("internal error")]
    Internal,
}

impl Error {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Precondition(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The client-facing detail string. `Internal` never echoes the
    /// underlying cause — it is logged separately via `tracing::error!`.
    fn detail(&self) -> String {
        match self {
            Self::Internal => "internal server error".to_string(),
            Self::RateLimited => "rate limit exceeded".to_string(),
            Self::Validation(d)
            | Self::Authentication(d)
            | Self::Authorization(d)
            | Self::NotFound(d)
            | Self::Conflict(d)
            | Self::Precondition(d) => d.clone(),
        }
    }
}

impl From<crate::store::StoreError> for Error {
    fn from(e: crate::store::StoreError) -> Self {
        match e {
            crate::store::StoreError::NotFound => Self::NotFound("resource not found".to_string()),
            crate::store::StoreError::Conflict => Self::Conflict("unique constraint violated".to_string()),
        }
    }
}

impl From<crate::lifecycle::LifecycleError> for Error {
    fn from(e: crate::lifecycle::LifecycleError) -> Self {
        match e {
            crate::lifecycle::LifecycleError::NotFound => Self::NotFound("resource not found".to_string()),
            crate::lifecycle::LifecycleError::Precondition(msg) => Self::Precondition(msg.to_string()),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        into_response(self)
    }
}

/// Free function so non-axum callers can build the same response shape
/// without depending on trait dispatch.
pub fn into_response(err: Error) -> Response {
    if matches!(err, Error::Internal) {
        tracing::error!(error = %err, "internal error");
    }
    let status = err.status();
    (status, Json(json!({ "detail": err.detail() }))).into_response()
}
