//! Application settings

use crate::core::link::{LinkConfig, BAUD_CANDIDATES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No configuration directory on this platform
    #[error("Could not determine config directory")]
    NoConfigDir,

    /// Reading or writing the file failed
    #[error("Config I/O error on {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid TOML for [`AppConfig`]
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Serialization failed
    #[error("Could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Values are out of range
    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        /// Offending key
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Serial port of the GPS receiver
    pub serial: SerialSettings,
    /// Link timing
    pub link: LinkSettings,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load from the default location, or defaults when the file is absent
    pub fn load() -> Result<Self, ConfigError> {
        let path = super::default_config_path().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&path)
    }

    /// Load from `path`, or defaults when the file is absent
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = super::default_config_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    /// Save to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(io_error)?;
        Ok(())
    }

    /// Reject values the link cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::Invalid {
                field: "serial.baud_rate",
                reason: "must be positive".to_string(),
            });
        }
        if self.link.baud_candidates.contains(&0) {
            return Err(ConfigError::Invalid {
                field: "link.baud_candidates",
                reason: "rates must be positive".to_string(),
            });
        }
        if self.link.max_line_length == Some(0) {
            return Err(ConfigError::Invalid {
                field: "link.max_line_length",
                reason: "must be positive when set".to_string(),
            });
        }
        Ok(())
    }

    /// Runtime configuration for the link supervisor
    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            port: self.serial.port.clone(),
            baud_rate: self.serial.baud_rate,
            reconnect_delay: Duration::from_secs(self.link.reconnect_delay_secs),
            probe_window: Duration::from_secs(self.link.probe_window_secs),
            publish_floor: Duration::from_secs(self.link.publish_floor_secs),
            max_line_length: self.link.max_line_length,
            baud_candidates: self.link.baud_candidates.clone(),
        }
    }
}

/// Serial port settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Device path
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: if cfg!(windows) { "COM1" } else { "/dev/ttyUSB0" }.to_string(),
            baud_rate: 4800,
        }
    }
}

/// Link timing and framing settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// Delay before reopening a failed port (seconds)
    pub reconnect_delay_secs: u64,
    /// Listening window per probed rate (seconds)
    pub probe_window_secs: u64,
    /// Republish interval for unchanged values (seconds)
    pub publish_floor_secs: u64,
    /// Cap on an unterminated line (bytes)
    pub max_line_length: Option<usize>,
    /// Rates tried by baud detection
    pub baud_candidates: Vec<u32>,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: 5,
            probe_window_secs: 3,
            publish_floor_secs: 60,
            max_line_length: None,
            baud_candidates: BAUD_CANDIDATES.to_vec(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (`info`, `gpslink_core=debug`, ...)
    pub level: String,
    /// Log file directory
    pub directory: Option<PathBuf>,
    /// Also write a daily log file
    pub file_logging: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: super::log_dir(),
            file_logging: false,
        }
    }
}
