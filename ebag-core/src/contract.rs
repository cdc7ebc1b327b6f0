//! # contract: the synchronisation provider interface
//!
//! The pipeline engine never talks to a remote store or the filesystem watcher
//! itself. Everything it needs is expressed as stages supplied by a
//! [`SyncProvider`]: each stage takes a [`Pipe`] and returns a new one,
//! spawning whatever tasks it needs to move events across.
//!
//! ## Stage contract
//! - A stage must close its output once its input is closed and every event it
//!   intends to emit has been sent.
//! - A stage must stop when its output receiver has been dropped.
//! - Transfer stages may run several transfers concurrently but must preserve
//!   the fields they do not own (`start_time` in particular).
//! - Errors never travel down a pipe. A stage that cannot handle an event logs
//!   it and either forwards or drops it, at its own discretion.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`, so consumers can build
//!   `MockSyncProvider` in their own tests (feature `test-export-mocks`).

use std::path::PathBuf;

use async_trait::async_trait;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

pub use crate::error::ProviderError;
use crate::event::{DownloadEvent, RemoteItem, UploadEvent};
use crate::pipe::Pipe;

/// Everything the download and upload pipelines need from a remote store.
///
/// All stage methods must be called from within a tokio runtime.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SyncProvider: Send + Sync {
    /// The local root directory this provider synchronises.
    fn local_root(&self) -> PathBuf;

    /// Enumerates remote objects. Finite.
    fn read_listing(&self) -> Pipe<RemoteItem>;

    /// Suppresses items whose content tag matches a recorded transfer and
    /// wraps the survivors as unstamped download events with their target path.
    fn filter_already_downloaded(&self, items: Pipe<RemoteItem>) -> Pipe<DownloadEvent>;

    /// Materializes each item at its local path.
    fn download_items(&self, events: Pipe<DownloadEvent>) -> Pipe<DownloadEvent>;

    /// Records the content tag of each transferred item. Pass-through.
    fn write_etag_data(&self, events: Pipe<DownloadEvent>) -> Pipe<DownloadEvent>;

    /// Starts watching [`SyncProvider::local_root`] and yields changed file paths.
    ///
    /// An error here means no watch exists and nothing was produced.
    async fn watch_dir(&self) -> Result<Pipe<PathBuf>, ProviderError>;

    /// Derives the remote key for each local path.
    fn remote_file_namer(&self, paths: Pipe<PathBuf>) -> Pipe<UploadEvent>;

    /// Pushes each file to the remote store.
    fn upload_items(&self, events: Pipe<UploadEvent>) -> Pipe<UploadEvent>;
}
