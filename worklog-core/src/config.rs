//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/worklog/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/worklog/` (~/.config/worklog/)
//! - State/Logs: `$XDG_STATE_HOME/worklog/` (~/.local/state/worklog/)

use crate::error::{Error, Result};
use crate::store::Backend;
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Workspace root; defaults to the current directory when absent
    pub root: Option<PathBuf>,

    /// Which storage backend to open
    #[serde(default)]
    pub backend: Backend,

    /// Default author for plan creation and pointer updates
    pub author: Option<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::debug!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Resolve the workspace root: explicit override, then the config file,
    /// then the current directory
    pub fn resolve_root(&self, override_root: Option<PathBuf>) -> PathBuf {
        override_root
            .or_else(|| self.root.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Default author: the config file's setting, falling back to `$USER`
    pub fn resolve_author(&self, override_author: Option<String>) -> Result<String> {
        override_author
            .or_else(|| self.author.clone())
            .or_else(|| std::env::var("USER").ok())
            .ok_or_else(|| {
                Error::Config(
                    "no author configured; pass --author or set 'author' in config.toml"
                        .to_string(),
                )
            })
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/worklog/config.toml` (~/.config/worklog/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("worklog").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/worklog/` (~/.local/state/worklog/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("worklog")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("worklog.log")
    }
}
