//! This module implements the CLI interface for ebag: command parsing, config
//! resolution and dispatch to the run modes.
//!
//! The pipeline engine lives in [`ebag-core`]; this module is glue.
//!
//! ## How To Use
//! - For command-line users: `ebag --help`.
//! - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
//!
//! [`ebag-core`]: ../../ebag_core/

use crate::load_config::{load_config, AppConfig, ConfigOverrides};
use crate::mirror::MirrorProvider;
use crate::serve::serve;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ebag_core::synchronise::{synchronise, RunMode};
use std::net::SocketAddr;
use std::path::PathBuf;

/// CLI for ebag: keep a drop directory in sync with a mirror.
#[derive(Parser, Debug)]
#[clap(
    name = "ebag",
    version,
    about = "Synchronise a local drop directory with a remote mirror"
)]
pub struct Cli {
    /// Path to a YAML config file
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Local directory to synchronise (default ./bag)
    #[clap(long, global = true)]
    pub drop_dir: Option<PathBuf>,

    /// Directory acting as the remote store
    #[clap(long, global = true)]
    pub mirror: Option<PathBuf>,

    /// Maximum concurrent downloads
    #[clap(long, global = true)]
    pub concurrency: Option<usize>,

    #[clap(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Pull every new or changed object from the mirror (default)
    Download,
    /// Watch the drop directory and push changes to the mirror
    Watch,
    /// Run the HTTP front-end
    Serve {
        /// Address to listen on (default 127.0.0.1:8080)
        #[clap(long)]
        addr: Option<SocketAddr>,
    },
}

impl Commands {
    pub fn mode(&self) -> RunMode {
        match self {
            Commands::Download => RunMode::Download,
            Commands::Watch => RunMode::Watch,
            Commands::Serve { .. } => RunMode::Serve,
        }
    }
}

impl Cli {
    /// Resolves defaults, the optional config file and flags into one config.
    pub fn app_config(&self) -> Result<AppConfig> {
        let file = match &self.config {
            Some(path) => Some(load_config(path)?),
            None => None,
        };
        let serve_addr = match &self.command {
            Some(Commands::Serve { addr }) => *addr,
            _ => None,
        };
        AppConfig::resolve(
            file,
            ConfigOverrides {
                drop_dir: self.drop_dir.clone(),
                mirror_root: self.mirror.clone(),
                transfer_concurrency: self.concurrency,
                serve_addr,
            },
        )
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    let command = cli.command.clone().unwrap_or(Commands::Download);
    let mode = command.mode();
    tracing::info!(%mode, "ebag starting");

    let config = cli.app_config()?;
    if mode == RunMode::Serve {
        return serve(config.serve_addr).await;
    }

    let provider = MirrorProvider::from_config(&config)?;
    let report = synchronise(mode, &provider)
        .await
        .with_context(|| format!("{mode} run failed"))?;
    tracing::info!(
        %mode,
        completed = report.completed,
        slowest = ?report.slowest,
        elapsed = ?report.elapsed,
        "Run complete"
    );
    Ok(())
}
