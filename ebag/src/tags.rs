//! Record of content tags for objects already pulled into the drop directory.
//!
//! Stored as a JSON object (`key -> etag`) in [`TAG_FILE_NAME`] at the root of
//! the drop directory. Writes go to a sibling temp file which is then renamed
//! over the real one.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

/// File name of the tag store inside the drop directory.
pub const TAG_FILE_NAME: &str = ".ebag-etags.json";

/// True for the tag store itself and its temp file; these are never synced.
pub fn is_tag_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(TAG_FILE_NAME))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagStore {
    path: PathBuf,
    tags: BTreeMap<String, String>,
}

impl TagStore {
    /// An empty store that will persist to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tags: BTreeMap::new(),
        }
    }

    /// Loads the store at `path`.
    ///
    /// A missing file is an empty store. An unreadable or corrupt file is
    /// logged and also treated as empty, so the next run re-downloads.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No tag store yet");
                return Self::empty(path);
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to read tag store");
                return Self::empty(path);
            }
        };
        match serde_json::from_slice(&content) {
            Ok(tags) => Self { path, tags },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt tag store");
                Self::empty(path)
            }
        }
    }

    /// True when `etag` is the tag recorded for `key`.
    pub fn matches(&self, key: &str, etag: &str) -> bool {
        self.tags.get(key).is_some_and(|stored| stored == etag)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn record(&mut self, key: impl Into<String>, etag: impl Into<String>) {
        self.tags.insert(key.into(), etag.into());
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Writes the store to disk.
    pub async fn save(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(&self.tags)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await
    }
}
