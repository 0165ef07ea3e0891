mod config;
pub mod database;
pub mod kv;

pub use config::{Config, RemindersConfig, RuntimeConfig};
pub use database::{Database, LogRecord};
pub use kv::{KvStore, MemoryKvStore};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `REMINDLOOP_DATA_DIR` wins outright. Otherwise `~/.config/remindloop/`,
/// or `~/.config/remindloop-dev/` when `REMINDLOOP_ENV=dev`.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("REMINDLOOP_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("REMINDLOOP_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("remindloop-dev")
            } else {
                base_dir.join("remindloop")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
