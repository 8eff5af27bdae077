//! CLI Exit Codes
//!
//! Exit codes for scripted use of the `gpslink` binary.

use crate::config::ConfigError;
use crate::core::transport::TransportError;
use std::process::ExitCode;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: u8 = 0;

    /// General error
    pub const ERROR: u8 = 1;

    /// Connection failed
    pub const CONNECTION_FAILED: u8 = 3;

    /// Permission denied
    pub const PERMISSION_DENIED: u8 = 7;

    /// Configuration error
    pub const CONFIG_ERROR: u8 = 8;

    /// No GPS output detected
    pub const DEVICE_NOT_FOUND: u8 = 12;

    /// Port not found
    pub const PORT_NOT_FOUND: u8 = 14;
}

/// CLI operation result
#[derive(Debug)]
pub enum CliResult {
    /// Success with optional message
    Success(Option<String>),

    /// Error with code and message
    Error(u8, String),
}

impl CliResult {
    /// Plain success
    pub fn success() -> Self {
        Self::Success(None)
    }

    /// Error with an explicit code
    pub fn error(code: u8, msg: impl Into<String>) -> Self {
        Self::Error(code, msg.into())
    }

    /// The device produced no fix sentences
    pub fn device_not_found(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::DEVICE_NOT_FOUND, msg.into())
    }

    /// Get exit code
    pub fn code(&self) -> u8 {
        match self {
            Self::Success(_) => ExitCodes::SUCCESS,
            Self::Error(code, _) => *code,
        }
    }

    /// Get message
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(Some(msg)) | Self::Error(_, msg) => Some(msg),
            Self::Success(None) => None,
        }
    }

    /// Convert to [`ExitCode`]
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Is success?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<ConfigError> for CliResult {
    fn from(err: ConfigError) -> Self {
        Self::Error(ExitCodes::CONFIG_ERROR, err.to_string())
    }
}

impl From<TransportError> for CliResult {
    fn from(err: TransportError) -> Self {
        let code = match &err {
            TransportError::PortNotFound(_) => ExitCodes::PORT_NOT_FOUND,
            TransportError::PermissionDenied(_) => ExitCodes::PERMISSION_DENIED,
            TransportError::ConnectionFailed(_) | TransportError::Disconnected => {
                ExitCodes::CONNECTION_FAILED
            }
            TransportError::Discovery(_) | TransportError::IoError(_) => ExitCodes::ERROR,
        };
        Self::Error(code, err.to_string())
    }
}

/// Exit code description
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        0 => "Success",
        1 => "General error",
        3 => "Connection failed",
        7 => "Permission denied",
        8 => "Configuration error",
        12 => "Device not found",
        14 => "Port not found",
        _ => "Unknown error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_result() {
        let success = CliResult::success();
        assert!(success.is_success());
        assert_eq!(success.code(), 0);
        assert_eq!(success.message(), None);

        let error = CliResult::device_not_found("no NMEA output");
        assert!(!error.is_success());
        assert_eq!(error.code(), 12);
        assert_eq!(error.message(), Some("no NMEA output"));
        assert_eq!(exit_code_description(error.code()), "Device not found");
    }

    #[test]
    fn test_from_errors() {
        let result = CliResult::from(TransportError::PortNotFound("/dev/ttyUSB9".into()));
        assert_eq!(result.code(), ExitCodes::PORT_NOT_FOUND);

        let result = CliResult::from(TransportError::PermissionDenied("/dev/ttyS0".into()));
        assert_eq!(result.code(), ExitCodes::PERMISSION_DENIED);
        assert_eq!(exit_code_description(result.code()), "Permission denied");

        let result = CliResult::from(TransportError::ConnectionFailed("busy".into()));
        assert_eq!(result.code(), ExitCodes::CONNECTION_FAILED);

        let result = CliResult::from(ConfigError::NoConfigDir);
        assert_eq!(result.code(), ExitCodes::CONFIG_ERROR);
    }
}
