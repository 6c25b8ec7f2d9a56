//! Command line interface.

use clap::{Args, Parser, Subcommand};
use opsdesk_jobs::RunOverrides;
use std::path::PathBuf;

/// Deferred admin action processor.
#[derive(Parser, Debug)]
#[command(name = "opsdesk-processor")]
#[command(version)]
#[command(about = "Processes deferred administrative actions from the MySQL queue")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding default.toml and the environment overlays
    #[arg(long, global = true, default_value = "./config")]
    pub config_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Process one batch and exit
    Run(RunArgs),
    /// Serve the HTTP trigger, health and metrics endpoints
    Serve,
}

/// Per-invocation overrides of the `[processor]` section.
#[derive(Args, Debug, Default, Clone, PartialEq, Eq)]
pub struct RunArgs {
    /// Maximum jobs to process in this invocation
    #[arg(long)]
    pub batch_size: Option<u32>,

    /// Cap on attempts per job, applied on top of each job's own limit
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Seconds after which a processing job is presumed dead
    #[arg(long)]
    pub lock_timeout_secs: Option<u64>,

    /// Hours after which pending or failed jobs expire
    #[arg(long)]
    pub expire_after_hours: Option<u64>,
}

impl RunArgs {
    /// Converts the flags into processor overrides.
    pub fn overrides(&self) -> RunOverrides {
        RunOverrides {
            batch_size: self.batch_size,
            max_retries: self.max_retries,
            lock_timeout_secs: self.lock_timeout_secs,
            expire_after_hours: self.expire_after_hours,
        }
    }
}
