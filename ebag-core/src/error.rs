use std::path::PathBuf;

/// Error type providers return from fallible setup calls.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that stop a synchronisation run before or instead of draining it.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The directory watch could not be established. No events were produced.
    #[error("failed to watch {}: {source}", .dir.display())]
    WatchSetup {
        dir: PathBuf,
        #[source]
        source: ProviderError,
    },

    /// The requested run mode has no pipeline in this crate.
    #[error("run mode `{0}` is not a synchronisation pipeline")]
    UnsupportedMode(&'static str),
}
