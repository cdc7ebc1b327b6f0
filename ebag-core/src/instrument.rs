//! Instrumentation adapter: wraps a pipe with a logging side effect.
//!
//! [`instrument`] takes a pipe and returns a pipe of the same event type. The
//! output carries the same events in the same order; the only field a probe
//! may change is the one it is contracted to stamp. After an event has been
//! forwarded the probe's [`Probe::report`] runs, so downstream work on event
//! *i* may begin before the log line for event *i* is written.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::event::{DownloadEvent, UploadEvent};
use crate::pipe::{handoff, Pipe};

/// A side effect attached to a stage boundary.
#[async_trait]
pub trait Probe<T>: Send + Sync + 'static {
    /// Whatever [`Probe::report`] needs once the event itself has moved on.
    type Record: Send + 'static;

    /// Stamps the event and captures the data for the report.
    fn stamp(&self, event: T, now: Instant) -> (T, Self::Record);

    /// Performs the side effect. Must not fail the stream.
    async fn report(&self, record: Self::Record);
}

/// Runs `probe` over every event flowing through `incoming`.
///
/// The returned pipe closes exactly once, after the last upstream event has
/// been forwarded. If the consumer goes away the adapter stops reading.
pub fn instrument<T, P>(mut incoming: Pipe<T>, probe: P) -> Pipe<T>
where
    T: Send + 'static,
    P: Probe<T>,
{
    let (tx, rx) = handoff();
    tokio::spawn(async move {
        while let Some(event) = incoming.recv().await {
            let (event, record) = probe.stamp(event, Instant::now());
            if tx.send(event).await.is_err() {
                break;
            }
            probe.report(record).await;
        }
    });
    rx
}

/// Marks the start of a download and logs its target and size.
#[derive(Debug, Default, Clone, Copy)]
pub struct DownloadStart;

#[async_trait]
impl Probe<DownloadEvent> for DownloadStart {
    type Record = (PathBuf, u64);

    fn stamp(&self, event: DownloadEvent, now: Instant) -> (DownloadEvent, Self::Record) {
        let record = (event.local_file_name.clone(), event.remote_item.size);
        (event.stamp_start(now), record)
    }

    async fn report(&self, record: Self::Record) {
        let (path, bytes) = record;
        info!(path = %path.display(), bytes, "Starting {} ({} bytes)", path.display(), bytes);
    }
}

/// Marks the start of an upload and logs the local file's current size.
///
/// The size is looked up on disk at report time, independently of anything
/// the event carries. A file that changed or vanished since it was detected
/// only produces a warning; the event has already been forwarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct UploadStart;

#[async_trait]
impl Probe<UploadEvent> for UploadStart {
    type Record = (PathBuf, String);

    fn stamp(&self, event: UploadEvent, now: Instant) -> (UploadEvent, Self::Record) {
        let record = (event.local_file_name.clone(), event.remote_key.clone());
        (event.stamp_start(now), record)
    }

    async fn report(&self, record: Self::Record) {
        let (path, key) = record;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => {
                let bytes = meta.len();
                info!(
                    path = %path.display(),
                    key = %key,
                    bytes,
                    "Starting upload {} ({} bytes) -> {}",
                    path.display(),
                    bytes,
                    key
                );
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    key = %key,
                    error = %e,
                    "Could not read size of upload source"
                );
            }
        }
    }
}
