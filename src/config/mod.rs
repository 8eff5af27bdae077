//! Configuration module
//!
//! Handles the TOML configuration file and application directories

mod settings;

pub use settings::{AppConfig, ConfigError, LinkSettings, LoggingConfig, SerialSettings};

use directories::ProjectDirs;
use std::path::PathBuf;

/// Configuration file name inside [`config_dir`]
pub const CONFIG_FILE: &str = "config.toml";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "gpslink", "GpsLink")
}

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the application data directory
pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// Get the default log directory
pub fn log_dir() -> Option<PathBuf> {
    data_dir().map(|d| d.join("logs"))
}

/// Default configuration file path
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(CONFIG_FILE))
}
