//! Configuration file handling.
//!
//! Reads from `~/.config/kdbkit/kdbkit.toml`

use crate::io::TextEncoding;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Library configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Maximum number of history snapshots per entry. Negative means unlimited.
    #[serde(default = "default_history_max_items")]
    pub history_max_items: i32,
    /// Maximum estimated size of an entry's history in bytes. Negative means unlimited.
    #[serde(default = "default_history_max_size")]
    pub history_max_size: i64,
    /// Encoding of text fields in legacy KDB files.
    #[serde(default)]
    pub legacy_text_encoding: TextEncoding,
    /// Keep undecodable meta-entries as opaque metadata instead of regular entries.
    #[serde(default = "default_lossless_meta")]
    pub lossless_meta: bool,
}

fn default_history_max_items() -> i32 {
    10
}

fn default_history_max_size() -> i64 {
    6 * 1024 * 1024
}

fn default_lossless_meta() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_max_items: default_history_max_items(),
            history_max_size: default_history_max_size(),
            legacy_text_encoding: TextEncoding::default(),
            lossless_meta: default_lossless_meta(),
        }
    }
}

impl Config {
    /// Load configuration from the config file.
    ///
    /// If `custom_path` is provided, load from that path and fail if it is missing.
    /// Otherwise, load from the default XDG config location, falling back to
    /// defaults when no file exists there.
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self> {
        let is_custom = custom_path.is_some();
        let config_path = match custom_path {
            Some(path) => path,
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            if is_custom {
                anyhow::bail!("Config file not found: {}", config_path.display());
            }
            tracing::debug!("No config at {}, using defaults", config_path.display());
            return Ok(Config::default());
        }

        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        tracing::info!("Loaded config from {}: {:?}", config_path.display(), config);
        Ok(config)
    }

    /// Parse TOML text. Missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save configuration to the given file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Get the path to the config file.
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("kdbkit").join("kdbkit.toml"))
    }
}
