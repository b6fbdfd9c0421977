use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use shroud_storage::CookieJar;

use crate::flags::PARTITION;

/// Environment variable that overrides the cookie store location
pub const DB_ENV_VAR: &str = "SHROUD_DB";

/// Get the local data directory for shroud.
///
/// # Errors
///
/// Returns an error if the local data directory cannot be determined.
pub fn get_data_dir() -> Result<PathBuf> {
    let mut path =
        dirs::data_local_dir().ok_or_else(|| anyhow::anyhow!("Failed to get local data dir"))?;
    path.push("shroud");
    Ok(path)
}

/// Default config file location: `<data_dir>/config.toml`
///
/// # Errors
///
/// Returns an error if the local data directory cannot be determined.
pub fn config_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("config.toml"))
}

/// When the notification window gets the privacy classes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedactionMode {
    /// Only where the host draws its own notification window (Windows)
    #[default]
    Auto,
    Always,
    Never,
}

impl RedactionMode {
    #[must_use]
    pub fn enabled_on(self, os: &str) -> bool {
        match self {
            Self::Auto => os == "windows",
            Self::Always => true,
            Self::Never => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cookie store location; defaults to the partition's standard path
    pub database_path: Option<PathBuf>,
    /// `env_logger` filter used when `RUST_LOG` is unset
    pub log_filter: String,
    pub notification_redaction: RedactionMode,
    /// URL fragment identifying the host's notification window
    pub notification_marker: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            log_filter: "info".to_string(),
            notification_redaction: RedactionMode::Auto,
            notification_marker: "znotification.html".to_string(),
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults when absent
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// # Errors
    ///
    /// Returns an error if serialization or the write fails
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {}", path.display()))
    }

    /// Effective store path: `SHROUD_DB`, then `database_path`, then the default
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        std::env::var_os(DB_ENV_VAR)
            .map(PathBuf::from)
            .or_else(|| self.database_path.clone())
            .unwrap_or_else(|| CookieJar::default_path(PARTITION))
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot be opened
    pub fn open_store(&self) -> Result<CookieJar> {
        CookieJar::open(&self.database_path(), PARTITION)
    }
}
