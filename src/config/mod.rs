//! Configuration management for docport
//!
//! Configuration is read from a TOML file (default `~/.docport/config.toml`).
//! A missing file is not an error: every field has a default, and credential
//! ids that are not in the file can still be supplied through environment
//! variables (see [`crate::credentials`]).
//!
//! Precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Configuration file
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection configuration
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Export pipeline tuning
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Stored credentials keyed by credential id
    #[serde(default)]
    pub credentials: BTreeMap<String, CredentialEntry>,
}

/// Connection-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Connection timeout in seconds for remote clusters
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Connection timeout in seconds for local emulator targets
    #[serde(default = "default_emulator_connect_timeout")]
    pub emulator_connect_timeout_secs: u64,

    /// Application name reported to the server
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

/// Export pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Documents requested from the server per page
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Buffered bytes that trigger an append to the destination file
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold_bytes: usize,

    /// Documents between two progress reports
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// One stored credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialEntry {
    /// MongoDB connection string, including secrets
    pub connection_string: String,

    /// Whether the target is a local emulator. Inferred from the host when omitted.
    #[serde(default)]
    pub emulator: Option<bool>,
}

// Default value functions
fn default_connect_timeout() -> u64 {
    30
}

fn default_emulator_connect_timeout() -> u64 {
    4
}

fn default_app_name() -> String {
    "docport".to_string()
}

fn default_batch_size() -> u32 {
    100
}

fn default_flush_threshold() -> usize {
    1024 * 1024
}

fn default_progress_interval() -> u64 {
    100
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            emulator_connect_timeout_secs: default_emulator_connect_timeout(),
            app_name: default_app_name(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            flush_threshold_bytes: default_flush_threshold(),
            progress_interval: default_progress_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).map_err(ConfigError::InvalidFormat)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, or the default location when `path` is `None`.
    ///
    /// A missing file yields the default configuration.
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source: e,
                }
                .into());
            }
        };

        Self::from_toml_str(&text)
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".docport")
            .join("config.toml")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let checks: [(&str, u64); 5] = [
            ("connection.connect_timeout_secs", self.connection.connect_timeout_secs),
            (
                "connection.emulator_connect_timeout_secs",
                self.connection.emulator_connect_timeout_secs,
            ),
            ("export.batch_size", u64::from(self.export.batch_size)),
            ("export.flush_threshold_bytes", self.export.flush_threshold_bytes as u64),
            ("export.progress_interval", self.export.progress_interval),
        ];

        for (field, value) in checks {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                }
                .into());
            }
        }

        for (id, entry) in &self.credentials {
            if entry.connection_string.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("credentials.{id}.connection_string"),
                    value: String::new(),
                }
                .into());
            }
        }

        Ok(())
    }
}

impl ConnectionConfig {
    /// Connection timeout for a target, shortened for local emulators
    pub fn timeout_for(&self, is_emulator: bool) -> Duration {
        if is_emulator {
            Duration::from_secs(self.emulator_connect_timeout_secs)
        } else {
            Duration::from_secs(self.connect_timeout_secs)
        }
    }
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}
