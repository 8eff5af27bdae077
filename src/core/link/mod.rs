//! GPS link supervision
//!
//! [`GpsLink`] is the handle to a spawned supervisor task that keeps one
//! serial GPS receiver connected: it opens the configured port, decodes NMEA
//! fix sentences into channel updates, reconnects after a fixed delay when
//! the port fails, and runs baud rate probes on request.
//!
//! ```rust,no_run
//! use gpslink_core::{GpsLink, LinkConfig, SerialPortFactory, TracingSink};
//!
//! # async fn demo() -> Result<(), gpslink_core::LinkError> {
//! let link = GpsLink::start(
//!     LinkConfig::new("/dev/ttyUSB0", 4800),
//!     SerialPortFactory::new(),
//!     TracingSink,
//! );
//! let detection = link.detect_baud_rate("/dev/ttyUSB0").await?;
//! println!("{detection}");
//! link.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod probe;
mod supervisor;

pub use probe::{BaudDetection, BAUD_CANDIDATES, DEFAULT_PROBE_WINDOW};

use crate::core::fix::FixRecord;
use crate::core::publisher::{StateSink, DEFAULT_PUBLISH_FLOOR};
use crate::core::state_machine::LinkState;
use crate::core::transport::{PortFactory, PortOption};
use std::time::Duration;
use supervisor::LinkSupervisor;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

/// Delay between a link failure and the next open attempt
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

const COMMAND_CAPACITY: usize = 256;
const EVENT_CAPACITY: usize = 1024;

/// Link handle errors
#[derive(Error, Debug)]
pub enum LinkError {
    /// The supervisor task is no longer running
    #[error("GPS link stopped")]
    Stopped,

    /// The supervisor task panicked or was cancelled
    #[error("GPS link task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Runtime configuration of a link
#[derive(Debug, Clone, PartialEq)]
pub struct LinkConfig {
    /// Serial device path
    pub port: String,
    /// Baud rate of the main link
    pub baud_rate: u32,
    /// Delay before reopening a failed port
    pub reconnect_delay: Duration,
    /// Listening window per probed baud rate
    pub probe_window: Duration,
    /// Republish interval for unchanged values
    pub publish_floor: Duration,
    /// Cap on an unterminated line; `None` buffers without limit
    pub max_line_length: Option<usize>,
    /// Rates swept by baud detection, in order
    pub baud_candidates: Vec<u32>,
}

impl LinkConfig {
    /// Configuration with default timing
    pub fn new(port: &str, baud_rate: u32) -> Self {
        Self {
            port: port.to_string(),
            baud_rate,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            probe_window: DEFAULT_PROBE_WINDOW,
            publish_floor: DEFAULT_PUBLISH_FLOOR,
            max_line_length: None,
            baud_candidates: BAUD_CANDIDATES.to_vec(),
        }
    }
}

/// Events broadcast by the supervisor
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// Link state changed
    StateChanged(LinkState),
    /// A fix sentence was decoded
    Fix(FixRecord),
}

/// Requests handled on the supervisor task
pub(crate) enum Command {
    ListPorts(oneshot::Sender<Vec<PortOption>>),
    DetectBaudRate {
        path: String,
        reply: oneshot::Sender<BaudDetection>,
    },
    TestPort {
        path: String,
        baud_rate: u32,
        reply: oneshot::Sender<bool>,
    },
    State(oneshot::Sender<LinkState>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to a running GPS link
pub struct GpsLink {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<LinkEvent>,
    task: JoinHandle<()>,
}

impl GpsLink {
    /// Spawn the supervisor. Must be called within a tokio runtime.
    pub fn start<F, S>(config: LinkConfig, factory: F, sink: S) -> Self
    where
        F: PortFactory + 'static,
        S: StateSink + 'static,
    {
        let (commands, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let supervisor = LinkSupervisor::new(config, factory, sink, events.clone());
        let task = tokio::spawn(supervisor.run(command_rx));

        Self {
            commands,
            events,
            task,
        }
    }

    /// Subscribe to state changes and decoded fixes
    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, LinkError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| LinkError::Stopped)?;
        response.await.map_err(|_| LinkError::Stopped)
    }

    /// Current link state
    pub async fn state(&self) -> Result<LinkState, LinkError> {
        self.request(Command::State).await
    }

    /// Ports available for selection; a single "Not available" entry when
    /// discovery fails
    pub async fn list_available_ports(&self) -> Result<Vec<PortOption>, LinkError> {
        self.request(Command::ListPorts).await
    }

    /// Sweep the candidate baud rates on `path`. When `path` is the port the
    /// link holds open, the link is released for the sweep and reopened
    /// afterwards.
    pub async fn detect_baud_rate(&self, path: &str) -> Result<BaudDetection, LinkError> {
        self.request(|reply| Command::DetectBaudRate {
            path: path.to_string(),
            reply,
        })
        .await
    }

    /// Check whether `path` emits fix sentences at `baud_rate`
    pub async fn test_port(&self, path: &str, baud_rate: u32) -> Result<bool, LinkError> {
        self.request(|reply| Command::TestPort {
            path: path.to_string(),
            baud_rate,
            reply,
        })
        .await
    }

    /// Close the port, publish the link inactive and wait for the task to end
    pub async fn shutdown(self) -> Result<(), LinkError> {
        self.request(Command::Shutdown).await?;
        self.task.await?;
        Ok(())
    }
}
