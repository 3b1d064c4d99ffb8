//! TOML-based configuration persistence for the listener.
//!
//! Reads and writes `AppConfig` to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\HidKey\config.toml`
//! - Linux:    `~/.config/hidkey/config.toml`
//! - macOS:    `~/Library/Application Support/HidKey/config.toml`
//!
//! Example file:
//!
//! ```toml
//! [listener]
//! poll_interval_ms = 10
//! stop_timeout_ms = 1000
//! max_line_len = 256
//! layout = "system"
//!
//! [logging]
//! log_level = "info"
//! ```
//!
//! # Serde default values (for beginners)
//!
//! Every section and field carries a serde default, so an empty file, a file
//! with only `[logging]`, or no file at all all produce a working config.
//! Older files keep loading when newer fields are added.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::listener::ListenerSettings;

/// Longest accepted pump interval.  Slower pumping stalls every keystroke on
/// the machine long enough for Windows to drop the hook.
pub const MAX_POLL_INTERVAL_MS: u64 = 100;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but is outside its allowed range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub listener: ListenerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which key translator the listener uses.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LayoutChoice {
    /// The active Windows keyboard layout (`ToUnicode`).
    #[default]
    System,
    /// A fixed US layout, independent of the user's layout settings.
    Us,
}

/// Hook worker settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListenerConfig {
    /// Sleep between message pumps on the hook thread, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How long `stop` waits for the hook thread, in milliseconds.
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
    /// Characters held before an unterminated token is dropped.
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,
    /// Key translator selection.
    #[serde(default)]
    pub layout: LayoutChoice,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_poll_interval_ms() -> u64 {
    10
}
fn default_stop_timeout_ms() -> u64 {
    1000
}
fn default_max_line_len() -> usize {
    hidkey_core::DEFAULT_MAX_LINE_LEN
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
            max_line_len: default_max_line_len(),
            layout: LayoutChoice::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Checks value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let listener = &self.listener;
        if listener.poll_interval_ms == 0 || listener.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(ConfigError::Invalid {
                field: "listener.poll_interval_ms",
                reason: format!("must be between 1 and {MAX_POLL_INTERVAL_MS}"),
            });
        }
        if listener.stop_timeout_ms < listener.poll_interval_ms {
            return Err(ConfigError::Invalid {
                field: "listener.stop_timeout_ms",
                reason: "must not be shorter than poll_interval_ms".to_string(),
            });
        }
        if listener.max_line_len == 0 {
            return Err(ConfigError::Invalid {
                field: "listener.max_line_len",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl From<&ListenerConfig> for ListenerSettings {
    fn from(config: &ListenerConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            stop_timeout: Duration::from_millis(config.stop_timeout_ms),
            max_line_len: config.max_line_len,
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from the platform location, returning defaults if the
/// file does not yet exist.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = config_file_path()?;
    load_optional(&path)
}

/// Loads `AppConfig` from an explicit path.  The file must exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read,
/// [`ConfigError::Parse`] if the TOML is malformed, and
/// [`ConfigError::Invalid`] if a value is out of range.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

fn load_optional(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Parses and validates TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let cfg: AppConfig = toml::from_str(content)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Persists `config` to the platform location and returns the path written.
pub fn save_config(config: &AppConfig) -> Result<PathBuf, ConfigError> {
    let path = config_file_path()?;
    save_config_to(config, &path)?;
    Ok(path)
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config base directory including the app subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("HidKey"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("hidkey"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("HidKey")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
