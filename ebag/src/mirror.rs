#![doc = "Directory mirror provider: a SyncProvider whose remote store is a directory tree."]
//
//! # Directory mirror
//!
//! [`MirrorProvider`] implements the core [`SyncProvider`] contract against a
//! plain directory (local disk or a mounted share) acting as the remote store.
//!
//! - Keys are paths relative to the store root, joined with `/`.
//! - Content tags are the lowercase hex SHA-256 of the object.
//! - Tags of transferred objects are kept in the drop directory's
//!   [`TagStore`]. One store is shared by every stage of a provider: it is
//!   loaded on first use and guarded by an async mutex.
//! - Transfer failures are logged here and the affected event is dropped; the
//!   pipeline never sees them.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use ebag_core::contract::{ProviderError, SyncProvider};
use ebag_core::event::{DownloadEvent, RemoteItem, UploadEvent};
use ebag_core::pipe::{handoff, into_stream, spawn_stream, Pipe, PipeSender};
use futures::{future, StreamExt};
use notify::{EventKind, RecursiveMode, Watcher};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, MutexGuard, OnceCell};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::load_config::{AppConfig, DEFAULT_TRANSFER_CONCURRENCY};
use crate::tags::{is_tag_file, TagStore, TAG_FILE_NAME};

/// Handle to the tag store shared by the filter, tag-write and upload stages.
#[derive(Clone)]
struct SharedTags {
    path: PathBuf,
    store: Arc<OnceCell<Mutex<TagStore>>>,
}

impl SharedTags {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            store: Arc::new(OnceCell::new()),
        }
    }

    async fn lock(&self) -> MutexGuard<'_, TagStore> {
        self.store
            .get_or_init(|| async { Mutex::new(TagStore::load(&self.path).await) })
            .await
            .lock()
            .await
    }

    /// Records `etag` for `key` and persists the whole store.
    async fn record(&self, key: &str, etag: &str) {
        let mut tags = self.lock().await;
        tags.record(key, etag);
        if let Err(e) = tags.save().await {
            error!(key = %key, error = %e, "Failed to persist content tag");
        }
    }
}

pub struct MirrorProvider {
    drop_dir: PathBuf,
    store_root: PathBuf,
    transfer_concurrency: usize,
    tags: SharedTags,
}

impl MirrorProvider {
    pub fn new(drop_dir: impl Into<PathBuf>, store_root: impl Into<PathBuf>) -> Self {
        let drop_dir = drop_dir.into();
        let tags = SharedTags::new(drop_dir.join(TAG_FILE_NAME));
        Self {
            drop_dir,
            store_root: store_root.into(),
            transfer_concurrency: DEFAULT_TRANSFER_CONCURRENCY,
            tags,
        }
    }

    /// Maximum number of downloads in flight at once.
    pub fn with_transfer_concurrency(mut self, transfer_concurrency: usize) -> Self {
        self.transfer_concurrency = transfer_concurrency.max(1);
        self
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let store_root = config.require_mirror_root()?;
        info!(
            drop_dir = %config.drop_dir.display(),
            store_root = %store_root.display(),
            "eBag LocalPath: {}",
            config.drop_dir.display()
        );
        Ok(Self::new(&config.drop_dir, store_root)
            .with_transfer_concurrency(config.transfer_concurrency))
    }

    pub fn drop_dir(&self) -> &Path {
        &self.drop_dir
    }

    pub fn store_root(&self) -> &Path {
        &self.store_root
    }

    pub fn tag_file(&self) -> &Path {
        &self.tags.path
    }
}

/// Key of `path` relative to `root`, or `None` if it lies outside `root`.
pub fn key_for(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?.to_owned()),
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Location of `key` under `root`. Empty, `.` and `..` segments are dropped so
/// a key can never point outside `root`.
pub fn path_for(root: &Path, key: &str) -> PathBuf {
    key.split('/')
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .fold(root.to_path_buf(), |path, part| path.join(part))
}

/// Content tag of the file at `path`.
pub fn content_tag(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Whether a watch notification means a file has new content ready to push.
///
/// inotify reports the close of a file opened for writing, so a file is pushed
/// once per completed write instead of once per write call. Files moved into
/// the tree count as well.
#[cfg(target_os = "linux")]
fn is_finished_write(kind: &EventKind) -> bool {
    use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};

    matches!(
        kind,
        EventKind::Access(AccessKind::Close(AccessMode::Write))
            | EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both))
    )
}

/// Whether a watch notification means a file has new content ready to push.
#[cfg(not(target_os = "linux"))]
fn is_finished_write(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

/// Content tag of `path`, computed on a blocking thread.
async fn content_tag_blocking(path: PathBuf) -> io::Result<String> {
    tokio::task::spawn_blocking(move || content_tag(&path))
        .await
        .map_err(io::Error::other)?
}

/// Walks the store on a blocking thread, one item at a time.
fn list_store(root: PathBuf, tx: PipeSender<RemoteItem>) {
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                error!(store_root = %root.display(), error = %e, "Failed to read mirror entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || is_tag_file(entry.path()) {
            continue;
        }
        let Some(key) = key_for(&root, entry.path()) else {
            warn!(path = %entry.path().display(), "Skipping mirror entry with a non UTF-8 name");
            continue;
        };
        let size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                error!(key = %key, error = %e, "Failed to stat mirror entry");
                continue;
            }
        };
        let etag = match content_tag(entry.path()) {
            Ok(etag) => etag,
            Err(e) => {
                error!(key = %key, error = %e, "Failed to hash mirror entry");
                continue;
            }
        };
        if tx.blocking_send(RemoteItem { key, size, etag }).is_err() {
            debug!("Listing consumer went away");
            break;
        }
    }
}

async fn copy_into_place(source: &Path, target: &Path) -> io::Result<u64> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(source, target).await
}

async fn download_one(store_root: &Path, event: DownloadEvent) -> Option<DownloadEvent> {
    let source = path_for(store_root, &event.remote_item.key);
    match copy_into_place(&source, &event.local_file_name).await {
        Ok(bytes) => {
            debug!(key = %event.remote_item.key, bytes, "Downloaded");
            Some(event)
        }
        Err(e) => {
            error!(
                key = %event.remote_item.key,
                path = %event.local_file_name.display(),
                error = %e,
                "Download failed"
            );
            None
        }
    }
}

#[async_trait]
impl SyncProvider for MirrorProvider {
    fn local_root(&self) -> PathBuf {
        self.drop_dir.clone()
    }

    fn read_listing(&self) -> Pipe<RemoteItem> {
        let (tx, rx) = handoff();
        let root = self.store_root.clone();
        tokio::task::spawn_blocking(move || list_store(root, tx));
        rx
    }

    fn filter_already_downloaded(&self, mut items: Pipe<RemoteItem>) -> Pipe<DownloadEvent> {
        let (tx, rx) = handoff();
        let tags = self.tags.clone();
        let drop_dir = self.drop_dir.clone();
        tokio::spawn(async move {
            while let Some(item) = items.recv().await {
                let already_downloaded = tags.lock().await.matches(&item.key, &item.etag);
                if already_downloaded {
                    debug!(key = %item.key, "Already downloaded, skipping");
                    continue;
                }
                let local_file_name = path_for(&drop_dir, &item.key);
                if tx.send(DownloadEvent::new(item, local_file_name)).await.is_err() {
                    break;
                }
            }
        });
        rx
    }

    fn download_items(&self, events: Pipe<DownloadEvent>) -> Pipe<DownloadEvent> {
        let store_root = self.store_root.clone();
        let transfers = into_stream(events)
            .map(move |event| {
                let store_root = store_root.clone();
                async move { download_one(&store_root, event).await }
            })
            .buffered(self.transfer_concurrency)
            .filter_map(future::ready);
        spawn_stream(transfers)
    }

    fn write_etag_data(&self, mut events: Pipe<DownloadEvent>) -> Pipe<DownloadEvent> {
        let (tx, rx) = handoff();
        let tags = self.tags.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                tags.record(&event.remote_item.key, &event.remote_item.etag).await;
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        rx
    }

    async fn watch_dir(&self) -> Result<Pipe<PathBuf>, ProviderError> {
        let root = self.drop_dir.clone();
        let is_dir = tokio::fs::metadata(&root)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(format!("{} is not a directory", root.display()).into());
        }

        let (raw_tx, mut raw_rx) = handoff::<PathBuf>();
        let mut watcher =
            notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
                match result {
                    Ok(event) => {
                        if !is_finished_write(&event.kind) {
                            return;
                        }
                        for path in event.paths {
                            if is_tag_file(&path) || !path.is_file() {
                                continue;
                            }
                            // Runs on the watcher's own thread, outside the runtime.
                            if raw_tx.blocking_send(path).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => error!(error = %e, "Watcher error"),
                }
            })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;
        info!(dir = %root.display(), "Watching for changes");

        let (tx, rx) = handoff();
        tokio::spawn(async move {
            // The watch lives exactly as long as this task.
            let _watcher = watcher;
            while let Some(path) = raw_rx.recv().await {
                if tx.send(path).await.is_err() {
                    break;
                }
            }
            debug!("Watch ended");
        });
        Ok(rx)
    }

    fn remote_file_namer(&self, mut paths: Pipe<PathBuf>) -> Pipe<UploadEvent> {
        let (tx, rx) = handoff();
        let root = self.drop_dir.clone();
        tokio::spawn(async move {
            while let Some(path) = paths.recv().await {
                let Some(key) = key_for(&root, &path) else {
                    warn!(
                        path = %path.display(),
                        root = %root.display(),
                        "Path is outside the drop directory, skipping"
                    );
                    continue;
                };
                if tx.send(UploadEvent::new(path, key)).await.is_err() {
                    break;
                }
            }
        });
        rx
    }

    fn upload_items(&self, mut events: Pipe<UploadEvent>) -> Pipe<UploadEvent> {
        let (tx, rx) = handoff();
        let store_root = self.store_root.clone();
        let tags = self.tags.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let target = path_for(&store_root, &event.remote_key);
                match copy_into_place(&event.local_file_name, &target).await {
                    Ok(bytes) => {
                        debug!(key = %event.remote_key, bytes, "Uploaded");
                        // A later download must not pull this object back.
                        match content_tag_blocking(target).await {
                            Ok(etag) => tags.record(&event.remote_key, &etag).await,
                            Err(e) => error!(
                                key = %event.remote_key,
                                error = %e,
                                "Failed to hash uploaded object"
                            ),
                        }
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!(
                            path = %event.local_file_name.display(),
                            key = %event.remote_key,
                            error = %e,
                            "Upload failed"
                        );
                    }
                }
            }
        });
        rx
    }
}
