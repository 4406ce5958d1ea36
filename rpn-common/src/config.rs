//! Configuration loading and config file resolution
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `RPN_CONFIG` environment variable
//! 3. Platform config directory (`~/.config/rpn/config.toml` on Linux)
//! 4. Compiled defaults (fallback)
//!
//! A missing config file is not fatal: a warning is logged and compiled
//! defaults are used. A file that exists but does not parse is an error.

use crate::identifier::{DEFAULT_REVISION, DEFAULT_SEQUENCE_WIDTH};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "RPN_CONFIG";

/// Generator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpnConfig {
    /// Revision tag appended to every issued report number
    #[serde(default = "default_revision")]
    pub revision: String,

    /// Zero-pad width of the sequence part
    #[serde(default = "default_sequence_width")]
    pub sequence_width: usize,

    /// Quiet period that coalesces bursts of field changes
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Delay before retrying an attempt that found the generator busy
    #[serde(default = "default_retry_ms")]
    pub retry_ms: u64,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
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

fn default_revision() -> String {
    DEFAULT_REVISION.to_string()
}

fn default_sequence_width() -> usize {
    DEFAULT_SEQUENCE_WIDTH
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_retry_ms() -> u64 {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RpnConfig {
    fn default() -> Self {
        Self {
            revision: default_revision(),
            sequence_width: default_sequence_width(),
            debounce_ms: default_debounce_ms(),
            retry_ms: default_retry_ms(),
            logging: LoggingConfig::default(),
        }
    }
}

impl RpnConfig {
    /// Parse and validate config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RpnConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Resolve the config file and load it, falling back to defaults
    ///
    /// An explicitly requested file (argument or environment) that is
    /// missing is an error; a missing platform default is not.
    pub fn load(cli_arg: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_arg) {
            ConfigSource::Explicit(path) => {
                info!("Loading config from {}", path.display());
                Self::load_from(&path)
            }
            ConfigSource::Platform(path) if path.exists() => {
                info!("Loading config from {}", path.display());
                Self::load_from(&path)
            }
            ConfigSource::Platform(path) => {
                warn!(
                    "No config file at {}, using compiled defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            ConfigSource::Defaults => {
                warn!("Could not determine config directory, using compiled defaults");
                Ok(Self::default())
            }
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.revision.is_empty() || !self.revision.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::Config(format!(
                "revision must be non-empty alphanumeric, got '{}'",
                self.revision
            )));
        }
        if !(1..=9).contains(&self.sequence_width) {
            return Err(Error::Config(format!(
                "sequence_width must be in 1..=9, got {}",
                self.sequence_width
            )));
        }
        if self.debounce_ms == 0 {
            return Err(Error::Config("debounce_ms must be greater than 0".to_string()));
        }
        if self.retry_ms == 0 {
            return Err(Error::Config("retry_ms must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }
}

/// Where the config file came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Named on the command line or in `RPN_CONFIG`
    Explicit(PathBuf),
    /// Platform config directory
    Platform(PathBuf),
    /// No usable location
    Defaults,
}

/// Resolve which config file to read
pub fn resolve_config_path(cli_arg: Option<&Path>) -> ConfigSource {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return ConfigSource::Explicit(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return ConfigSource::Explicit(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    match dirs::config_dir() {
        Some(dir) => ConfigSource::Platform(dir.join("rpn").join("config.toml")),
        None => ConfigSource::Defaults,
    }
}
