//! CLI Module
//!
//! Exit codes and output formats for the `gpslink` binary

pub mod exit_codes;

pub use exit_codes::{exit_code_description, CliResult, ExitCodes};

use clap::ValueEnum;

/// Output format for command results and published updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON for scripting
    Json,
}

impl From<OutputFormat> for crate::core::sink::LineFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => Self::Text,
            OutputFormat::Json => Self::JsonLines,
        }
    }
}
