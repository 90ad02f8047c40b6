//! Server bootstrap: shared application state, router assembly, and the
//! top-level `Service` that binds, serves, and gracefully shuts down.
//!
//! Grounded on `gateway/server.rs::Gateway::run` (bind, broadcast shutdown
//! channel, `axum::serve(...).with_graceful_shutdown(...)`, ctrl_c/SIGTERM
//! `shutdown_signal`) and `gateway/router.rs::create_router` (layering
//! order: request-scoped middleware innermost, `CatchPanicLayer`,
//! `CompressionLayer`, `TraceLayer` outermost). AIMS has no backend
//! warm-start/health-check tasks to run alongside the listener, so that part
//! of the teacher's `run()` is dropped.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Error;
use crate::handlers;
use crate::rate_limit::{api_bucket, auth_bucket, is_exempt_path, RateLimiter};
use crate::store::memory::InMemoryStore;
use crate::store::Store;

/// Application state shared across every handler. Cheap to clone: every
/// field is reference-counted or plain config data.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub rate_limiter: Arc<RateLimiter>,
}

/// Builds the full router: health check, auth-token exchange, and the
/// gated resource operations, wrapped in rate limiting and the request
/// timing header (§6), then the teacher's standard outer layers.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/_health", get(health))
        .merge(handlers::routes())
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(middleware::from_fn(request_duration_middleware))
        .layer(CatchPanicLayer::new())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Extracts the caller's IP from `X-Forwarded-For`/`X-Real-IP`, falling
/// back to the literal `unknown` (§4.7) when neither header is present —
/// this service sits behind a reverse proxy that terminates TLS and sets
/// one of them; the raw peer address is not read directly.
pub(crate) fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// Rate limiting middleware (§4.7): `auth:<ip>` for `POST /auth/token`,
/// `api:<ip>` for every other non-exempt path.
async fn rate_limit_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();
    let ip = client_ip(&headers);

    let admitted = if path == "/auth/token" && request.method() == axum::http::Method::POST {
        state
            .rate_limiter
            .check(&auth_bucket(&ip), state.config.rate_limit_auth_per_minute)
    } else if is_exempt_path(path) {
        true
    } else {
        state
            .rate_limiter
            .check(&api_bucket(&ip), state.config.rate_limit_api_per_minute)
    };

    if admitted {
        next.run(request).await
    } else {
        Error::RateLimited.into_response()
    }
}

/// Stamps every response with `X-Request-Duration-Ms` (§6), a two-decimal
/// float measured from when this middleware starts running to when the
/// downstream handler returns.
async fn request_duration_middleware(request: Request<axum::body::Body>, next: Next) -> Response {
    let start = Instant::now();
    let mut response = next.run(request).await;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    if let Ok(value) = format!("{elapsed_ms:.2}").parse() {
        response.headers_mut().insert("X-Request-Duration-Ms", value);
    }
    response
}

/// Top-level service: owns configuration and the store, builds the router,
/// and runs it with graceful shutdown.
pub struct Service {
    config: Config,
    store: Arc<dyn Store>,
}

impl Service {
    /// Creates a new service backed by a fresh in-memory store. The
    /// persistence engine is an external collaborator (§1); an
    /// `InMemoryStore` stands in for it, satisfying the same transactional
    /// contract.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store: Arc::new(InMemoryStore::new()),
        }
    }

    /// Runs the service until a shutdown signal arrives, draining in-flight
    /// requests before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured address cannot be bound or the
    /// server encounters an unrecoverable runtime error.
    pub async fn run(self) -> anyhow::Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.server.host, self.config.server.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid bind address: {e}"))?;

        let shutdown_timeout = Duration::from_secs(self.config.server.shutdown_timeout_secs);
        let state = AppState {
            config: Arc::new(self.config),
            store: self.store,
            rate_limiter: Arc::new(RateLimiter::new()),
        };

        let app = create_router(state);
        let listener = TcpListener::bind(addr).await?;

        info!("============================================================");
        info!("AIMS — Agent Identity Management Service v{}", env!("CARGO_PKG_VERSION"));
        info!("============================================================");
        info!(%addr, "Listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!(timeout = ?shutdown_timeout, "Shutdown signal handled, exiting");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    warn!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AppState {
        AppState {
            config: Arc::new(Config::default()),
            store: Arc::new(InMemoryStore::new()),
            rate_limiter: Arc::new(RateLimiter::new()),
        }
    }

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.1, 10.0.0.2".parse().unwrap());
        assert_eq!(client_ip(&headers), "10.0.0.1");
    }

    #[test]
    fn client_ip_falls_back_to_unknown() {
        let headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), "unknown");
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let state = test_state();
        let app = create_router(state);
        let response = tower::ServiceExt::oneshot(
            app,
            axum::http::Request::builder()
                .uri("/_health")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
