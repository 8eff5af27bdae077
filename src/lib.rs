//! # GpsLink Core Library
//!
//! Keeps a serial NMEA 0183 GPS receiver connected and turns its output into
//! a small set of named state channels:
//!
//! - Line framing of arbitrarily chunked serial data
//! - NMEA sentence parsing with checksum validation
//! - GGA/RMC decoding (position, satellites, HDOP, altitude, speed, course)
//! - Change-gated publishing with a periodic republish floor
//! - Automatic reconnection after port errors
//! - Baud rate detection and port liveness tests
//!
//! ## Example
//!
//! ```rust,no_run
//! use gpslink_core::{GpsLink, LinkConfig, LinkEvent, SerialPortFactory, TracingSink};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let link = GpsLink::start(
//!         LinkConfig::new("/dev/ttyUSB0", 4800),
//!         SerialPortFactory::new(),
//!         TracingSink,
//!     );
//!
//!     let mut events = link.subscribe();
//!     while let Ok(event) = events.recv().await {
//!         if let LinkEvent::Fix(fix) = event {
//!             println!("{:?} {:?}", fix.latitude, fix.longitude);
//!         }
//!     }
//!
//!     link.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;
pub mod logging;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes, OutputFormat};
pub use crate::config::{AppConfig, ConfigError};
pub use crate::core::fix::{channels, FixDecoder, FixQuality, FixRecord};
pub use crate::core::link::{BaudDetection, GpsLink, LinkConfig, LinkError, LinkEvent};
pub use crate::core::protocol::{LineFramer, NmeaError, Sentence};
pub use crate::core::publisher::{ChangeGatedPublisher, ChannelValue, SinkError, StateSink};
pub use crate::core::sink::{ChannelSink, LineFormat, StateUpdate, TracingSink, WriterSink};
pub use crate::core::state_machine::LinkState;
pub use crate::core::transport::{
    PortDescriptor, PortEvent, PortFactory, PortHandle, PortOption, SerialPortFactory,
    TransportError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
