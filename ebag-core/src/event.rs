//! Event records that travel between pipeline stages.
//!
//! Events are plain values. They are moved through every handoff pipe, so at
//! any instant exactly one stage owns a given event. A stage hands the same
//! value on with only the fields it is responsible for changed.

use std::path::{Path, PathBuf};

use tokio::time::Instant;

/// Descriptor of one object in the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteItem {
    /// `/`-separated key relative to the store root.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Content tag. Only the provider interprets it.
    pub etag: String,
}

/// Progress of one remote object being pulled down to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadEvent {
    pub remote_item: RemoteItem,
    /// Where the object is (or will be) materialized.
    pub local_file_name: PathBuf,
    /// Set once by the download instrumentation stage.
    pub start_time: Option<Instant>,
}

impl DownloadEvent {
    pub fn new(remote_item: RemoteItem, local_file_name: impl Into<PathBuf>) -> Self {
        Self {
            remote_item,
            local_file_name: local_file_name.into(),
            start_time: None,
        }
    }

    /// Records `at` as the start of active processing. An already stamped
    /// event keeps its original start.
    pub fn stamp_start(mut self, at: Instant) -> Self {
        self.start_time.get_or_insert(at);
        self
    }
}

/// Progress of one local file being pushed to the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadEvent {
    /// Local source path.
    pub local_file_name: PathBuf,
    /// Key derived from the local path by the namer stage.
    pub remote_key: String,
    /// Set once by the upload instrumentation stage.
    pub start_time: Option<Instant>,
}

impl UploadEvent {
    pub fn new(local_file_name: impl Into<PathBuf>, remote_key: impl Into<String>) -> Self {
        Self {
            local_file_name: local_file_name.into(),
            remote_key: remote_key.into(),
            start_time: None,
        }
    }

    /// See [`DownloadEvent::stamp_start`].
    pub fn stamp_start(mut self, at: Instant) -> Self {
        self.start_time.get_or_insert(at);
        self
    }
}

/// What the sink needs to know about any event it drains.
pub trait Timed {
    fn local_file_name(&self) -> &Path;
    fn start_time(&self) -> Option<Instant>;
}

impl Timed for DownloadEvent {
    fn local_file_name(&self) -> &Path {
        &self.local_file_name
    }

    fn start_time(&self) -> Option<Instant> {
        self.start_time
    }
}

impl Timed for UploadEvent {
    fn local_file_name(&self) -> &Path {
        &self.local_file_name
    }

    fn start_time(&self) -> Option<Instant> {
        self.start_time
    }
}
