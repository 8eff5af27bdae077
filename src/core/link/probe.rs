//! Baud rate detection and port liveness tests
//!
//! Each probe opens a transient transport, listens for a fix sentence
//! marker (`$xxGGA` / `$xxRMC`) for a bounded window, and closes the
//! transport again whatever the outcome. Candidates are tried strictly one
//! after another: there is only one physical port.

use crate::core::transport::{PortEvent, PortFactory, TransportError};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

/// Rates tried by [`detect_baud_rate`], in order
pub const BAUD_CANDIDATES: [u32; 6] = [4800, 9600, 19200, 38400, 57600, 115200];

/// How long a single candidate is listened to
pub const DEFAULT_PROBE_WINDOW: Duration = Duration::from_secs(3);

const PROBE_EVENT_CAPACITY: usize = 64;

const FIX_SENTENCE_TYPES: [&[u8]; 2] = [b"GGA", b"RMC"];

/// Result of a baud rate sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BaudDetection {
    /// First rate that produced a fix sentence
    Detected(u32),
    /// No candidate produced a fix sentence
    Undetected,
}

impl BaudDetection {
    /// Detected rate, if any
    pub fn rate(&self) -> Option<u32> {
        match self {
            Self::Detected(rate) => Some(*rate),
            Self::Undetected => None,
        }
    }
}

impl fmt::Display for BaudDetection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detected(rate) => write!(f, "{rate}"),
            Self::Undetected => write!(f, "undetected"),
        }
    }
}

/// Whether received bytes contain `$` + talker + `GGA`/`RMC`
pub fn contains_fix_marker(received: &[u8]) -> bool {
    received
        .iter()
        .enumerate()
        .filter(|(_, &b)| b == b'$')
        .filter_map(|(i, _)| received.get(i + 3..i + 6))
        .any(|sentence_type| FIX_SENTENCE_TYPES.contains(&sentence_type))
}

/// Open `path` at `baud_rate` and listen up to `window` for a fix sentence.
/// The transient transport is always closed before returning. An open
/// failure is returned as is.
pub async fn listen_for_fix(
    factory: &dyn PortFactory,
    path: &str,
    baud_rate: u32,
    window: Duration,
) -> Result<bool, TransportError> {
    let (tx, mut rx) = mpsc::channel(PROBE_EVENT_CAPACITY);
    let mut port = factory.open(path, baud_rate, tx).await.map_err(|e| {
        tracing::debug!("Probe open {} @ {} failed: {}", path, baud_rate, e);
        e
    })?;

    let mut received = Vec::new();
    let found = tokio::time::timeout(window, async {
        while let Some(event) = rx.recv().await {
            match event {
                PortEvent::Data(chunk) => {
                    received.extend_from_slice(&chunk);
                    if contains_fix_marker(&received) {
                        return true;
                    }
                }
                PortEvent::Error(reason) => {
                    tracing::debug!("Probe {} @ {} error: {}", path, baud_rate, reason);
                    return false;
                }
                PortEvent::Closed => return false,
            }
        }
        false
    })
    .await
    .unwrap_or(false);

    drop(rx);
    if let Err(e) = port.close().await {
        tracing::warn!("Failed to close probe port {}: {}", path, e);
    }

    tracing::debug!(
        "Probe {} @ {}: {} ({} bytes)",
        path,
        baud_rate,
        if found { "fix sentences" } else { "silent" },
        received.len()
    );
    Ok(found)
}

/// Sweep `candidates` and return the first rate that yields a fix sentence.
///
/// A candidate that fails to open counts as silent. The sweep only fails
/// when not a single candidate could be opened, with the last open error.
pub async fn detect_baud_rate(
    factory: &dyn PortFactory,
    path: &str,
    candidates: &[u32],
    window: Duration,
) -> Result<BaudDetection, TransportError> {
    let mut last_error = None;
    let mut opened_any = false;

    for &baud_rate in candidates {
        tracing::info!("Probing {} at {} baud...", path, baud_rate);
        match listen_for_fix(factory, path, baud_rate, window).await {
            Ok(true) => {
                tracing::info!("Detected {} baud on {}", baud_rate, path);
                return Ok(BaudDetection::Detected(baud_rate));
            }
            Ok(false) => opened_any = true,
            Err(e) => last_error = Some(e),
        }
    }

    match last_error {
        Some(e) if !opened_any => Err(e),
        _ => {
            tracing::warn!("No NMEA output detected on {}", path);
            Ok(BaudDetection::Undetected)
        }
    }
}

/// Single-rate liveness test
pub async fn test_port(
    factory: &dyn PortFactory,
    path: &str,
    baud_rate: u32,
    window: Duration,
) -> Result<bool, TransportError> {
    listen_for_fix(factory, path, baud_rate, window).await
}
