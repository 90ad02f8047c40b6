//! AIMS - Agent Identity Management Service
//!
//! Machine identity lifecycle management: agents, API keys, capabilities,
//! and the audit trail that ties them together.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use aims::{cli::Cli, config::Config, server::Service, setup_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(mut config) => {
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            if let Some(ref host) = cli.host {
                config.server.host = host.clone();
            }
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        jwt_algorithm = %config.jwt_algorithm,
        "Starting AIMS"
    );

    let service = Service::new(config);

    if let Err(e) = service.run().await {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    info!("AIMS shutdown complete");
    ExitCode::SUCCESS
}
