//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

/// Settings for the `sincro` binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory of the active store (default: ./config/active).
    pub active_dir: PathBuf,

    /// Directory of the sync store (default: ./config/sync).
    pub sync_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let active_dir = env::var("SINCRO_ACTIVE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/active"));

        let sync_dir = env::var("SINCRO_SYNC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/sync"));

        Self {
            active_dir,
            sync_dir,
        }
    }
}
