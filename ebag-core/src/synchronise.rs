//! Orchestrators: run one synchronisation direction to completion.
//!
//! Each run records its start instant, builds the matching composer over the
//! given provider, drains it and logs the total. Callers construct the
//! provider (bound to their configured local root) and pick the mode; nothing
//! is kept between runs.

use std::fmt;

use tokio::time::Instant;
use tracing::info;

use crate::contract::SyncProvider;
use crate::error::SyncError;
use crate::pipeline::{download_pipeline, upload_pipeline};
use crate::sink::{drain, DrainReport};

/// Mutually exclusive ways to run the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Pull the remote store down into the local root.
    #[default]
    Download,
    /// Watch the local root and push changes up.
    Watch,
    /// Serve the HTTP front-end.
    Serve,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Download => "download",
            RunMode::Watch => "watch",
            RunMode::Serve => "serve",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pulls every remote object that is not already present locally.
pub async fn run_download<P>(provider: &P) -> Result<DrainReport, SyncError>
where
    P: SyncProvider + ?Sized,
{
    let run_started = Instant::now();
    info!(local_root = %provider.local_root().display(), "Starting download");
    let pipeline = download_pipeline(provider);
    let report = drain(pipeline, run_started).await;
    info!(
        completed = report.completed,
        elapsed = ?report.elapsed,
        "Finished downloading: {:?}",
        report.elapsed
    );
    Ok(report)
}

/// Watches the local root and uploads changes until the watch ends.
pub async fn run_upload<P>(provider: &P) -> Result<DrainReport, SyncError>
where
    P: SyncProvider + ?Sized,
{
    let run_started = Instant::now();
    info!(local_root = %provider.local_root().display(), "Starting upload watch");
    let pipeline = upload_pipeline(provider).await?;
    let report = drain(pipeline, run_started).await;
    info!(
        completed = report.completed,
        elapsed = ?report.elapsed,
        "Finished uploading: {:?}",
        report.elapsed
    );
    Ok(report)
}

/// Runs the pipeline for `mode`.
pub async fn synchronise<P>(mode: RunMode, provider: &P) -> Result<DrainReport, SyncError>
where
    P: SyncProvider + ?Sized,
{
    match mode {
        RunMode::Download => run_download(provider).await,
        RunMode::Watch => run_upload(provider).await,
        RunMode::Serve => Err(SyncError::UnsupportedMode(mode.as_str())),
    }
}
