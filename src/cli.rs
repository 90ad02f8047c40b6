//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

/// Agent Identity Management Service — issues, validates, and
/// lifecycle-manages machine agent identities, API keys, bearer tokens, and
/// capability grants.
#[derive(Parser, Debug)]
#[command(name = "aims-server")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML).
    #[arg(short, long, env = "AIMS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(short, long, env = "AIMS_PORT")]
    pub port: Option<u16>,

    /// Host to bind to.
    #[arg(long, env = "AIMS_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "AIMS_LOG_LEVEL")]
    pub log_level: String,

    /// Log format (text, json).
    #[arg(long, env = "AIMS_LOG_FORMAT")]
    pub log_format: Option<String>,
}
