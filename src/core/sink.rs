//! State sink implementations
//!
//! - [`TracingSink`]: logs every update
//! - [`WriterSink`]: text or JSON lines to any writer (stdout for the CLI)
//! - [`ChannelSink`]: forwards updates into a tokio channel for a host process

use super::publisher::{ChannelValue, SinkError, StateSink};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use tokio::sync::mpsc;

/// One published update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateUpdate {
    /// Channel identifier
    pub channel: String,
    /// Published value
    pub value: ChannelValue,
}

/// Logs updates at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl StateSink for TracingSink {
    fn publish(&mut self, channel: &str, value: &ChannelValue) -> Result<(), SinkError> {
        tracing::info!(channel, %value, "state update");
        Ok(())
    }
}

/// Line format for [`WriterSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineFormat {
    /// `<timestamp> <channel> = <value>`
    #[default]
    Text,
    /// One JSON object per line
    JsonLines,
}

#[derive(Serialize)]
struct JsonLine<'a> {
    timestamp: DateTime<Utc>,
    channel: &'a str,
    value: &'a ChannelValue,
}

/// Writes updates line by line
pub struct WriterSink<W> {
    writer: W,
    format: LineFormat,
}

impl<W: Write + Send> WriterSink<W> {
    /// Create a sink writing in the given format
    pub fn new(writer: W, format: LineFormat) -> Self {
        Self { writer, format }
    }

    /// Consume the sink and return the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> StateSink for WriterSink<W> {
    fn publish(&mut self, channel: &str, value: &ChannelValue) -> Result<(), SinkError> {
        let timestamp = Utc::now();
        match self.format {
            LineFormat::Text => {
                writeln!(
                    self.writer,
                    "{} {} = {}",
                    timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
                    channel,
                    value
                )?;
            }
            LineFormat::JsonLines => {
                let line = serde_json::to_string(&JsonLine {
                    timestamp,
                    channel,
                    value,
                })?;
                writeln!(self.writer, "{line}")?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Forwards updates to an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StateUpdate>,
}

impl ChannelSink {
    /// Create a sink and the receiving end
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StateUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StateSink for ChannelSink {
    fn publish(&mut self, channel: &str, value: &ChannelValue) -> Result<(), SinkError> {
        self.tx
            .send(StateUpdate {
                channel: channel.to_string(),
                value: value.clone(),
            })
            .map_err(|_| SinkError::Closed)
    }
}
