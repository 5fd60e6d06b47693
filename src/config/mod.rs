//! Configuration management for bson-compat
//!
//! Configuration is read from a TOML file. Every field has a default, so a
//! partial file (or no file at all) is valid:
//!
//! ```toml
//! [decode]
//! max_depth = 64
//! lossy_utf8 = false
//!
//! [logging]
//! level = "debug"
//! timestamps = false
//! ```
//!
//! Precedence (highest to lowest):
//! 1. Command-line flags (`-v`, `-vv`, `--config`)
//! 2. Configuration file
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::decode::{DEFAULT_MAX_DEPTH, DecodeOptions};
use crate::error::{ConfigError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Decoder limits and behaviour
    #[serde(default)]
    pub decode: DecodeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Decoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeConfig {
    /// Deepest document nesting accepted below the root
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Replace invalid UTF-8 in generic string values instead of failing
    #[serde(default)]
    pub lossy_utf8: bool,
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

// Default value functions
fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            lossy_utf8: false,
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

impl CodecConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Result<CodecConfig>` - Loaded and validated configuration or error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    ///
    /// # Arguments
    /// * `content` - TOML document
    ///
    /// # Returns
    /// * `Result<CodecConfig>` - Parsed and validated configuration or error
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: CodecConfig =
            toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default location
    ///
    /// Falls back to defaults when no file exists there.
    ///
    /// # Returns
    /// * `Result<CodecConfig>` - Loaded configuration or error
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - Path to default configuration file
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".bson-compat")
            .join("config.toml")
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        if self.decode.max_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "decode.max_depth".to_string(),
                value: self.decode.max_depth.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Decoder options described by this configuration
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            max_depth: self.decode.max_depth,
            lossy_utf8: self.decode.lossy_utf8,
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
