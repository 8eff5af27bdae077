//! Change-gated publishing of channel values
//!
//! Every decoded sentence produces the same handful of updates, most of them
//! unchanged. [`ChangeGatedPublisher`] forwards a value to the [`StateSink`]
//! only when it differs from the last published one, or when the re-publish
//! floor has elapsed since the last write (heartbeat on idle).

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Default re-publish floor for unchanged values
pub const DEFAULT_PUBLISH_FLOOR: Duration = Duration::from_secs(60);

/// Value carried on a channel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChannelValue {
    /// Boolean flag
    Bool(bool),
    /// Integer count
    Integer(i64),
    /// Floating point measurement
    Number(f64),
    /// Text representation
    Text(String),
}

impl fmt::Display for ChannelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// Sink error types
#[derive(Error, Debug)]
pub enum SinkError {
    /// Receiving side is gone
    #[error("Sink closed")]
    Closed,

    /// Write failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// External state store receiving published values.
///
/// Fire-and-forget: the publisher logs failures and does not retry.
pub trait StateSink: Send {
    /// Write one channel value
    fn publish(&mut self, channel: &str, value: &ChannelValue) -> Result<(), SinkError>;
}

impl<S: StateSink + ?Sized> StateSink for Box<S> {
    fn publish(&mut self, channel: &str, value: &ChannelValue) -> Result<(), SinkError> {
        (**self).publish(channel, value)
    }
}

#[derive(Debug, Clone)]
struct PublishedEntry {
    value: ChannelValue,
    published_at: Instant,
}

/// Deduplicating publisher owning the last-published state per channel
pub struct ChangeGatedPublisher<S> {
    sink: S,
    floor: Duration,
    published: HashMap<String, PublishedEntry>,
}

impl<S: StateSink> ChangeGatedPublisher<S> {
    /// Create with the default 60 second floor
    pub fn new(sink: S) -> Self {
        Self::with_floor(sink, DEFAULT_PUBLISH_FLOOR)
    }

    /// Create with a custom re-publish floor
    pub fn with_floor(sink: S, floor: Duration) -> Self {
        Self {
            sink,
            floor,
            published: HashMap::new(),
        }
    }

    /// Publish `value` on `channel` unless it repeats the last value within the floor.
    /// Returns whether the sink was written.
    pub fn publish_if_changed(&mut self, channel: &str, value: ChannelValue) -> bool {
        self.publish_if_changed_at(channel, value, Instant::now())
    }

    /// [`publish_if_changed`](Self::publish_if_changed) with an explicit clock reading
    pub fn publish_if_changed_at(&mut self, channel: &str, value: ChannelValue, now: Instant) -> bool {
        if let Some(entry) = self.published.get(channel) {
            let unchanged = entry.value == value;
            let fresh = now.saturating_duration_since(entry.published_at) < self.floor;
            if unchanged && fresh {
                return false;
            }
        }

        if let Err(e) = self.sink.publish(channel, &value) {
            tracing::warn!("Failed to publish {}: {}", channel, e);
        }

        self.published.insert(
            channel.to_string(),
            PublishedEntry {
                value,
                published_at: now,
            },
        );
        true
    }

    /// Last value published on a channel
    pub fn last_value(&self, channel: &str) -> Option<&ChannelValue> {
        self.published.get(channel).map(|entry| &entry.value)
    }

    /// Re-publish floor
    pub fn floor(&self) -> Duration {
        self.floor
    }

    /// Access the sink
    pub fn sink(&self) -> &S {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        writes: Vec<(String, ChannelValue)>,
    }

    impl StateSink for RecordingSink {
        fn publish(&mut self, channel: &str, value: &ChannelValue) -> Result<(), SinkError> {
            self.writes.push((channel.to_string(), value.clone()));
            Ok(())
        }
    }

    struct FailingSink;

    impl StateSink for FailingSink {
        fn publish(&mut self, _channel: &str, _value: &ChannelValue) -> Result<(), SinkError> {
            Err(SinkError::Closed)
        }
    }

    #[test]
    fn test_duplicate_within_floor_suppressed() {
        let mut publisher = ChangeGatedPublisher::new(RecordingSink::default());
        let t0 = Instant::now();

        assert!(publisher.publish_if_changed_at("x", ChannelValue::Integer(1), t0));
        assert!(!publisher.publish_if_changed_at("x", ChannelValue::Integer(1), t0 + Duration::from_secs(59)));
        assert_eq!(publisher.sink().writes.len(), 1);
    }

    #[test]
    fn test_duplicate_after_floor_republished() {
        let mut publisher = ChangeGatedPublisher::new(RecordingSink::default());
        let t0 = Instant::now();

        publisher.publish_if_changed_at("x", ChannelValue::Integer(1), t0);
        assert!(publisher.publish_if_changed_at("x", ChannelValue::Integer(1), t0 + Duration::from_secs(61)));
        assert_eq!(publisher.sink().writes.len(), 2);

        // Floor restarts from the heartbeat publish
        assert!(!publisher.publish_if_changed_at("x", ChannelValue::Integer(1), t0 + Duration::from_secs(90)));
    }

    #[test]
    fn test_changed_value_published_immediately() {
        let mut publisher = ChangeGatedPublisher::new(RecordingSink::default());
        let t0 = Instant::now();

        publisher.publish_if_changed_at("x", ChannelValue::Integer(1), t0);
        assert!(publisher.publish_if_changed_at("x", ChannelValue::Integer(2), t0));
        assert_eq!(
            publisher.sink().writes,
            vec![
                ("x".to_string(), ChannelValue::Integer(1)),
                ("x".to_string(), ChannelValue::Integer(2)),
            ]
        );
        assert_eq!(publisher.last_value("x"), Some(&ChannelValue::Integer(2)));
    }

    #[test]
    fn test_channels_are_independent() {
        let mut publisher = ChangeGatedPublisher::new(RecordingSink::default());
        let t0 = Instant::now();

        assert!(publisher.publish_if_changed_at("a", ChannelValue::Bool(true), t0));
        assert!(publisher.publish_if_changed_at("b", ChannelValue::Bool(true), t0));
        assert!(!publisher.publish_if_changed_at("a", ChannelValue::Bool(true), t0));
    }

    #[test]
    fn test_sink_failure_is_not_retried() {
        let mut publisher = ChangeGatedPublisher::new(FailingSink);
        let t0 = Instant::now();

        assert!(publisher.publish_if_changed_at("x", ChannelValue::Number(1.5), t0));
        assert!(!publisher.publish_if_changed_at("x", ChannelValue::Number(1.5), t0));
        assert_eq!(publisher.last_value("x"), Some(&ChannelValue::Number(1.5)));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(ChannelValue::Bool(false).to_string(), "false");
        assert_eq!(ChannelValue::Text("1;2".into()).to_string(), "1;2");
        assert_eq!(serde_json::to_string(&ChannelValue::Number(0.9)).unwrap(), "0.9");
    }
}
