//! Transport layer for the GPS link
//!
//! The supervisor never touches a serial port directly. It asks a
//! [`PortFactory`] to open a path at a baud rate and receives the port's
//! lifecycle as [`PortEvent`]s on a channel it owns. Dropping that channel
//! detaches the supervisor from a transport for good, so no event of a closed
//! session can leak into the next one.

mod serial;

pub use serial::{SerialPortFactory, SerialPortHandle};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Label of the placeholder entry returned when port discovery fails
pub const NOT_AVAILABLE_LABEL: &str = "Not available";

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Open failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Port enumeration failed
    #[error("Port discovery failed: {0}")]
    Discovery(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Disconnected
    #[error("Disconnected")]
    Disconnected,
}

/// Lifecycle events delivered by an open port
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortEvent {
    /// Raw bytes at an arbitrary boundary
    Data(Bytes),
    /// Transport reported a failure
    Error(String),
    /// Transport closed by the device or OS
    Closed,
}

/// Available port as reported by discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescriptor {
    /// Device path (`/dev/ttyUSB0`, `COM3`)
    pub path: String,
    /// USB manufacturer, when known
    pub manufacturer: Option<String>,
    /// USB product name, when known
    pub product: Option<String>,
}

impl PortDescriptor {
    /// Descriptor for a path without USB metadata
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            manufacturer: None,
            product: None,
        }
    }

    /// Human-readable label
    pub fn label(&self) -> String {
        match (&self.manufacturer, &self.product) {
            (Some(m), Some(p)) => format!("{} ({} {})", self.path, m, p),
            (Some(m), None) => format!("{} ({})", self.path, m),
            (None, Some(p)) => format!("{} ({})", self.path, p),
            (None, None) => self.path.clone(),
        }
    }
}

/// Selectable port entry for a configuration UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortOption {
    /// Display label
    pub label: String,
    /// Value to store as the configured path
    pub value: String,
}

impl PortOption {
    /// Placeholder used when discovery fails
    pub fn not_available() -> Self {
        Self {
            label: NOT_AVAILABLE_LABEL.to_string(),
            value: String::new(),
        }
    }
}

impl From<&PortDescriptor> for PortOption {
    fn from(port: &PortDescriptor) -> Self {
        Self {
            label: port.label(),
            value: port.path.clone(),
        }
    }
}

/// An open transport
#[async_trait]
pub trait PortHandle: Send {
    /// Check if the transport still reports itself open
    fn is_open(&self) -> bool;

    /// Close and wait for completion
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Connection info string
    fn connection_info(&self) -> String;
}

/// Opens transports and lists available ports
#[async_trait]
pub trait PortFactory: Send + Sync {
    /// Open `path` at `baud_rate`, delivering lifecycle events on `events`
    async fn open(
        &self,
        path: &str,
        baud_rate: u32,
        events: mpsc::Sender<PortEvent>,
    ) -> Result<Box<dyn PortHandle>, TransportError>;

    /// List available ports
    fn list(&self) -> Result<Vec<PortDescriptor>, TransportError>;
}

/// Port options for a configuration UI; a single placeholder on failure
pub fn available_port_options(factory: &dyn PortFactory) -> Vec<PortOption> {
    match factory.list() {
        Ok(ports) => ports.iter().map(PortOption::from).collect(),
        Err(e) => {
            tracing::warn!("Failed to list serial ports: {}", e);
            vec![PortOption::not_available()]
        }
    }
}
