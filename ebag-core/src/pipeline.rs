//! Composers that chain provider stages into the two synchronisation flows.

use tracing::error;

use crate::contract::SyncProvider;
use crate::error::SyncError;
use crate::event::{DownloadEvent, UploadEvent};
use crate::instrument::{instrument, DownloadStart, UploadStart};
use crate::pipe::Pipe;

/// listing → filter → instrument(start) → download → write tag.
pub fn download_pipeline<P>(provider: &P) -> Pipe<DownloadEvent>
where
    P: SyncProvider + ?Sized,
{
    let lister = provider.read_listing();
    let etag_filter = provider.filter_already_downloaded(lister);
    let log_start = instrument(etag_filter, DownloadStart);
    let downloader = provider.download_items(log_start);
    provider.write_etag_data(downloader)
}

/// watch → name → instrument(start) → upload.
///
/// Fails with [`SyncError::WatchSetup`] when the watch cannot be established;
/// in that case no other stage is constructed.
pub async fn upload_pipeline<P>(provider: &P) -> Result<Pipe<UploadEvent>, SyncError>
where
    P: SyncProvider + ?Sized,
{
    let watcher = match provider.watch_dir().await {
        Ok(watcher) => watcher,
        Err(source) => {
            let dir = provider.local_root();
            error!(dir = %dir.display(), error = %source, "Failed to watch directory");
            return Err(SyncError::WatchSetup { dir, source });
        }
    };
    let namer = provider.remote_file_namer(watcher);
    let log_start = instrument(namer, UploadStart);
    Ok(provider.upload_items(log_start))
}
