//! Configuration management for Layup.
//!
//! Loads configuration from ${LAYUP_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Persistent storage area filename.
pub const LOCAL_STORAGE_FILE: &str = "local_storage.json";
/// Session storage area filename.
pub const SESSION_STORAGE_FILE: &str = "session_storage.json";

/// Returns the default config template with comments.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for Layup configuration and data directories.
    //!
    //! LAYUP_HOME resolution order:
    //! 1. LAYUP_HOME environment variable (if set)
    //! 2. ~/.config/layup (default)
    //! 3. ./.layup when no home directory can be determined

    use std::path::PathBuf;

    /// Returns the Layup home directory.
    pub fn layup_home() -> PathBuf {
        if let Ok(home) = std::env::var("LAYUP_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".layup"),
            |h| h.join(".config").join("layup"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        layup_home().join("config.toml")
    }
}

/// Auth-flow persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Write saved states to persistent storage as well as session storage.
    pub persistent: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { persistent: true }
    }
}

/// Toast display durations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub error_duration_ms: u64,
    pub success_duration_ms: u64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            error_duration_ms: 5000,
            success_duration_ms: 3000,
        }
    }
}

impl NotificationsConfig {
    pub fn error_duration(&self) -> Duration {
        Duration::from_millis(self.error_duration_ms)
    }

    pub fn success_duration(&self) -> Duration {
        Duration::from_millis(self.success_duration_ms)
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory for the storage files (defaults to LAYUP_HOME)
    pub storage_dir: Option<String>,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,
}

impl Config {
    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Directory holding the storage files.
    pub fn storage_dir(&self) -> PathBuf {
        match self.storage_dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => paths::layup_home(),
        }
    }

    pub fn local_storage_path(&self) -> PathBuf {
        self.storage_dir().join(LOCAL_STORAGE_FILE)
    }

    pub fn session_storage_path(&self) -> PathBuf {
        self.storage_dir().join(SESSION_STORAGE_FILE)
    }

    /// Creates a default config file at the given path.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}
