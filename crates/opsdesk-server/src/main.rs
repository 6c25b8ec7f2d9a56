//! # opsdesk-processor
//!
//! Processes deferred administrative actions.
//!
//! - `opsdesk-processor run [--batch-size N ...]` processes one batch, prints
//!   a line per job and a summary, and exits 0. It exits 1 if the batch could
//!   not start (bad parameters, database unreachable).
//! - `opsdesk-processor serve` exposes the same pass behind
//!   `POST /internal/actions/process`, plus health and metrics endpoints.

use anyhow::Context;
use clap::Parser;
use opsdesk_config::{AppConfig, ConfigLoader};
use opsdesk_core::telemetry::init_logging;
use opsdesk_server::app;
use opsdesk_server::cli::{Cli, Command};
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("opsdesk-processor: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.observability.logging()) {
        eprintln!("opsdesk-processor: {}", e);
    }
    info!(version = env!("CARGO_PKG_VERSION"), environment = %config.app.environment, "Starting opsdesk-processor");

    match cli.command {
        Command::Run(args) => match app::run_once(&config, &args.overrides()).await {
            Ok(report) => {
                println!("{}", report);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, setup = e.is_setup(), "Processing aborted");
                eprintln!("opsdesk-processor: {}", e);
                ExitCode::FAILURE
            }
        },
        Command::Serve => match app::serve(&config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!(error = %e, "Server error");
                eprintln!("opsdesk-processor: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}

async fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let loader = ConfigLoader::new(&cli.config_dir)
        .with_context(|| format!("failed to load configuration from {}", cli.config_dir.display()))?;
    Ok(loader.get().await)
}
