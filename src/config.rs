//! Configuration management (§6).
//!
//! A single `Config` struct loaded once at startup via `figment`
//! (`Figment::new()` merged with an optional YAML file, then environment
//! variables), mirroring the teacher's `Config::load` shape. Config is
//! read-only after process start (§5) — process bootstrap itself is an
//! external collaborator per spec §1, but the struct a running binary needs
//! to hold its settings is ambient plumbing, carried regardless.

use std::path::Path;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Top-level configuration: every env var named in spec §6, plus the server
/// bind address and shutdown grace period needed to actually run the
/// service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP bind address.
    pub server: ServerConfig,
    /// Connection string for the persistence engine (external collaborator,
    /// §1 — AIMS itself never opens it; carried here only so it can be
    /// threaded to whichever store implementation is wired in at startup).
    pub database_url: String,
    /// Shared HMAC secret used to sign and verify bearer tokens.
    pub jwt_secret_key: String,
    /// JWT signing algorithm. HMAC variants only (§4.2).
    pub jwt_algorithm: String,
    /// Bearer token lifetime in minutes.
    pub jwt_expiration_minutes: i64,
    /// Prefix prepended to generated raw API keys.
    pub api_key_prefix: String,
    /// Hours a `rotated` key remains acceptable for token exchange.
    pub key_rotation_grace_hours: i64,
    /// `POST /auth/token` rate limit, requests per minute per IP.
    pub rate_limit_auth_per_minute: usize,
    /// General API rate limit, requests per minute per IP.
    pub rate_limit_api_per_minute: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database_url: "sqlite://./aims.db".to_string(),
            jwt_secret_key: "change-me-in-production-use-a-random-256-bit-key".to_string(),
            jwt_algorithm: "HS256".to_string(),
            jwt_expiration_minutes: 30,
            api_key_prefix: "aims_".to_string(),
            key_rotation_grace_hours: 24,
            rate_limit_auth_per_minute: 20,
            rate_limit_api_per_minute: 60,
        }
    }
}

/// HTTP server bind address and shutdown behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host/interface to bind.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Seconds to wait for in-flight requests to finish during graceful
    /// shutdown before proceeding anyway.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Loads configuration from an optional YAML file, then overlays
    /// `AIMS_`-prefixed environment variables (`AIMS_JWT_SECRET_KEY`,
    /// `AIMS_SERVER__PORT`, ...). Fields not set by either source keep their
    /// [`Default`].
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is given but does not exist, or if the
    /// merged configuration fails to deserialize.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                anyhow::bail!("config file not found: {}", p.display());
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed("AIMS_").split("__"));

        let config: Self = figment.extract()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_section_six() {
        let config = Config::default();
        assert_eq!(config.jwt_algorithm, "HS256");
        assert_eq!(config.jwt_expiration_minutes, 30);
        assert_eq!(config.api_key_prefix, "aims_");
        assert_eq!(config.key_rotation_grace_hours, 24);
        assert_eq!(config.rate_limit_auth_per_minute, 20);
        assert_eq!(config.rate_limit_api_per_minute, 60);
    }

    #[test]
    fn load_without_file_or_env_returns_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn load_rejects_missing_file() {
        let result = Config::load(Some(Path::new("/nonexistent/aims.yaml")));
        assert!(result.is_err());
    }
}
