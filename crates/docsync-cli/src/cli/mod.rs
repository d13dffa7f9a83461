//! CLI for docsync.

mod commands;
pub mod exit;

use anyhow::Result;
use clap::{Parser, Subcommand};
use docsync_core::config::{self, SyncConfig};
use docsync_core::logging;
use std::path::PathBuf;

use commands::{run_check, run_checksum, run_once, run_status, run_watch};

/// Top-level CLI for docsync.
#[derive(Debug, Parser)]
#[command(name = "docsync")]
#[command(about = "docsync: mirror the data files of a public document index", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/docsync/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override `download_root` from the config.
    #[arg(long, global = true, value_name = "PATH")]
    pub download_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run one sync job now (discover, download, reconcile, with retries).
    Run,

    /// Run a sync job now and then every N hours until interrupted.
    Watch {
        /// Hours between job starts.
        #[arg(long, default_value = "24", value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
        every_hours: u64,
    },

    /// Reconcile the metadata store with the files on disk and list issues.
    Check,

    /// Show tracked files per category and the failure signal.
    Status,

    /// Compute SHA-256 of a file.
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },
}

impl Cli {
    /// Config from `--config` (or the default location) with overrides applied.
    fn load_config(&self) -> Result<SyncConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load_from_path(path)?,
            None => config::load_or_init()?,
        };
        if let Some(root) = &self.download_root {
            cfg.download_root = root.clone();
        }
        Ok(cfg)
    }
}

/// Parse arguments, set up logging and dispatch. Returns the process exit code.
pub async fn run_from_args() -> Result<i32> {
    let cli = Cli::parse();

    if let CliCommand::Checksum { path } = &cli.command {
        logging::init_logging_stderr();
        run_checksum(path)?;
        return Ok(exit::OK);
    }

    let cfg = cli.load_config()?;
    if let Err(e) = logging::init_logging(&cfg.log_dir()) {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable, using stderr: {:#}", e);
    }
    tracing::debug!("loaded config: {:?}", cfg);

    match cli.command {
        CliCommand::Run => run_once(cfg).await,
        CliCommand::Watch { every_hours } => run_watch(cfg, every_hours).await,
        CliCommand::Check => run_check(&cfg).map(|()| exit::OK),
        CliCommand::Status => run_status(&cfg).map(|()| exit::OK),
        CliCommand::Checksum { .. } => Ok(exit::OK),
    }
}
