//! Serial port transport implementation

use super::{PortDescriptor, PortEvent, PortFactory, PortHandle, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use serialport::SerialPortType;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::sync::CancellationToken;

/// Default read buffer size
const READ_BUFFER_SIZE: usize = 4096;

fn map_open_error(path: &str, e: serialport::Error) -> TransportError {
    match e.kind() {
        serialport::ErrorKind::NoDevice => TransportError::PortNotFound(path.to_string()),
        serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
            TransportError::PermissionDenied(path.to_string())
        }
        serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
            TransportError::PortNotFound(path.to_string())
        }
        _ => TransportError::ConnectionFailed(e.to_string()),
    }
}

/// Opens serial ports through `tokio-serial` (8N1, no flow control)
#[derive(Debug, Clone)]
pub struct SerialPortFactory {
    read_buffer_size: usize,
}

impl Default for SerialPortFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialPortFactory {
    /// Create a factory with the default read buffer
    pub fn new() -> Self {
        Self {
            read_buffer_size: READ_BUFFER_SIZE,
        }
    }

    /// Set read buffer size
    #[must_use]
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }
}

#[async_trait]
impl PortFactory for SerialPortFactory {
    async fn open(
        &self,
        path: &str,
        baud_rate: u32,
        events: mpsc::Sender<PortEvent>,
    ) -> Result<Box<dyn PortHandle>, TransportError> {
        let stream = tokio_serial::new(path, baud_rate)
            .open_native_async()
            .map_err(|e| map_open_error(path, e))?;

        let cancel = CancellationToken::new();
        let reader = tokio::spawn(read_loop(
            stream,
            events,
            cancel.clone(),
            self.read_buffer_size,
        ));

        tracing::debug!("Opened {} @ {} baud", path, baud_rate);

        Ok(Box::new(SerialPortHandle {
            path: path.to_string(),
            baud_rate,
            cancel,
            reader: Some(reader),
        }))
    }

    fn list(&self) -> Result<Vec<PortDescriptor>, TransportError> {
        let ports = serialport::available_ports()
            .map_err(|e| TransportError::Discovery(e.to_string()))?;

        Ok(ports
            .into_iter()
            .map(|port| match port.port_type {
                SerialPortType::UsbPort(usb) => PortDescriptor {
                    path: port.port_name,
                    manufacturer: usb.manufacturer,
                    product: usb.product,
                },
                _ => PortDescriptor::new(&port.port_name),
            })
            .collect())
    }
}

/// Deliver one event unless the handle is being closed.
/// Returns false when the reader should stop.
async fn forward(
    events: &mpsc::Sender<PortEvent>,
    cancel: &CancellationToken,
    event: PortEvent,
) -> bool {
    tokio::select! {
        () = cancel.cancelled() => false,
        sent = events.send(event) => sent.is_ok(),
    }
}

async fn read_loop(
    mut stream: SerialStream,
    events: mpsc::Sender<PortEvent>,
    cancel: CancellationToken,
    buffer_size: usize,
) {
    let mut buffer = vec![0u8; buffer_size];

    loop {
        let read = tokio::select! {
            () = cancel.cancelled() => break,
            read = stream.read(&mut buffer) => read,
        };

        match read {
            Ok(0) => {
                forward(&events, &cancel, PortEvent::Closed).await;
                break;
            }
            Ok(n) => {
                let chunk = Bytes::copy_from_slice(&buffer[..n]);
                if !forward(&events, &cancel, PortEvent::Data(chunk)).await {
                    break;
                }
            }
            Err(e) => {
                if forward(&events, &cancel, PortEvent::Error(e.to_string())).await {
                    forward(&events, &cancel, PortEvent::Closed).await;
                }
                break;
            }
        }
    }
}

/// Open serial port; the stream lives in a reader task
pub struct SerialPortHandle {
    path: String,
    baud_rate: u32,
    cancel: CancellationToken,
    reader: Option<JoinHandle<()>>,
}

#[async_trait]
impl PortHandle for SerialPortHandle {
    fn is_open(&self) -> bool {
        !self.cancel.is_cancelled() && self.reader.as_ref().is_some_and(|r| !r.is_finished())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.cancel.cancel();
        if let Some(reader) = self.reader.take() {
            // The stream is dropped, and the device released, when the task ends
            reader
                .await
                .map_err(|e| TransportError::IoError(std::io::Error::other(e)))?;
        }
        tracing::debug!("Closed {}", self.path);
        Ok(())
    }

    fn connection_info(&self) -> String {
        format!("{} @ {} baud (8N1)", self.path, self.baud_rate)
    }
}

impl Drop for SerialPortHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
