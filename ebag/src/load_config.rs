//! `load_config` module: reads the optional YAML config file and resolves it,
//! together with command line overrides, into an [`AppConfig`].
//!
//! Precedence, lowest first: built-in defaults, the YAML file, flags.
//!
//! # Errors
//! All errors in this module use `anyhow::Error` for context-rich diagnostics,
//! and are surfaced at the CLI boundary.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const DEFAULT_DROP_DIR: &str = "./bag";
pub const DEFAULT_TRANSFER_CONCURRENCY: usize = 4;
pub const DEFAULT_SERVE_ADDR: &str = "127.0.0.1:8080";

/// Keys accepted in the YAML file. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub drop_dir: Option<PathBuf>,
    pub mirror_root: Option<PathBuf>,
    pub transfer_concurrency: Option<usize>,
    pub serve_addr: Option<SocketAddr>,
}

/// Values given on the command line.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub drop_dir: Option<PathBuf>,
    pub mirror_root: Option<PathBuf>,
    pub transfer_concurrency: Option<usize>,
    pub serve_addr: Option<SocketAddr>,
}

/// Fully resolved configuration handed to the orchestrators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Absolute path of the local directory being synchronised.
    pub drop_dir: PathBuf,
    /// Directory acting as the remote store. Required to sync.
    pub mirror_root: Option<PathBuf>,
    pub transfer_concurrency: usize,
    pub serve_addr: SocketAddr,
}

impl AppConfig {
    pub fn resolve(file: Option<FileConfig>, overrides: ConfigOverrides) -> Result<Self> {
        let file = file.unwrap_or_default();

        let drop_dir = overrides
            .drop_dir
            .or(file.drop_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DROP_DIR));
        let drop_dir = absolute(&drop_dir)?;

        let mirror_root = match overrides.mirror_root.or(file.mirror_root) {
            Some(root) => Some(absolute(&root)?),
            None => None,
        };

        let transfer_concurrency = overrides
            .transfer_concurrency
            .or(file.transfer_concurrency)
            .unwrap_or(DEFAULT_TRANSFER_CONCURRENCY);
        if transfer_concurrency == 0 {
            bail!("transfer_concurrency must be at least 1");
        }

        let serve_addr = match overrides.serve_addr.or(file.serve_addr) {
            Some(addr) => addr,
            None => DEFAULT_SERVE_ADDR
                .parse()
                .context("default serve address is invalid")?,
        };

        let config = AppConfig {
            drop_dir,
            mirror_root,
            transfer_concurrency,
            serve_addr,
        };
        info!(
            drop_dir = %config.drop_dir.display(),
            mirror_root = ?config.mirror_root,
            transfer_concurrency = config.transfer_concurrency,
            serve_addr = %config.serve_addr,
            "Resolved configuration"
        );
        Ok(config)
    }

    /// The mirror root, or an error naming how to set it.
    pub fn require_mirror_root(&self) -> Result<&Path> {
        self.mirror_root
            .as_deref()
            .context("no mirror configured: pass --mirror or set mirror_root in the config file")
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    Ok(cwd.join(path))
}

/// Loads a YAML config file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty document is a config with every key left at its default.
    if config_content.trim().is_empty() {
        return Ok(FileConfig::default());
    }

    match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}
