mod support;

use gpslink_core::{
    channels, ChangeGatedPublisher, ChannelSink, ChannelValue, FixDecoder, FixRecord, LineFramer,
    Sentence, StateUpdate,
};
use std::time::Duration;
use support::{GGA, GGA_MOVED, GSV, RMC};
use tokio::time::Instant;

fn stream() -> Vec<u8> {
    let mut bytes = b"\x00\xff garbage before the first line\r\n".to_vec();
    for sentence in [GGA, GSV, RMC, "$GPGGA,bad*00\r\n", GGA_MOVED] {
        bytes.extend_from_slice(sentence.as_bytes());
    }
    bytes
}

fn decode_chunks<'a>(chunks: impl Iterator<Item = &'a [u8]>) -> Vec<FixRecord> {
    let mut framer = LineFramer::new();
    let decoder = FixDecoder::new();
    chunks
        .flat_map(|chunk| framer.ingest(chunk))
        .flat_map(|line| line.sentences())
        .filter_map(|raw| Sentence::parse(&raw).ok())
        .filter_map(|sentence| decoder.decode(&sentence))
        .collect()
}

#[test]
fn chunking_does_not_change_decoded_fixes() {
    let data = stream();
    let whole = decode_chunks(std::iter::once(data.as_slice()));

    let types: Vec<&str> = whole.iter().map(|f| f.sentence_type.as_str()).collect();
    assert_eq!(types, vec!["GPGGA", "GPRMC", "GPGGA"]);

    for size in [1, 2, 3, 7, 13, 64] {
        assert_eq!(decode_chunks(data.chunks(size)), whole, "chunk size {size}");
    }
}

#[test]
fn unchanged_fixes_are_gated_until_the_floor() {
    let (sink, mut updates) = ChannelSink::new();
    let mut publisher = ChangeGatedPublisher::with_floor(sink, Duration::from_secs(60));
    let decoder = FixDecoder::new();
    let t0 = Instant::now();

    let mut publish = |text: &str, at: Instant| {
        let sentence = Sentence::parse(text).unwrap();
        let fix = decoder.decode(&sentence).unwrap();
        for (channel, value) in fix.updates() {
            publisher.publish_if_changed_at(channel, value, at);
        }
    };
    let received = |updates: &mut tokio::sync::mpsc::UnboundedReceiver<StateUpdate>| {
        let mut names = Vec::new();
        while let Ok(update) = updates.try_recv() {
            names.push(update.channel);
        }
        names
    };

    publish(GGA, t0);
    assert_eq!(received(&mut updates).len(), 8);

    publish(GGA, t0 + Duration::from_secs(1));
    assert!(received(&mut updates).is_empty());

    publish(GGA_MOVED, t0 + Duration::from_secs(2));
    let changed = received(&mut updates);
    assert!(changed.contains(&channels::LATITUDE.to_string()));
    assert!(changed.contains(&channels::SATELLITES.to_string()));
    assert!(!changed.contains(&channels::CONNECTION.to_string()));

    publish(GGA_MOVED, t0 + Duration::from_secs(63));
    assert_eq!(received(&mut updates).len(), 8);
    assert_eq!(
        publisher.last_value(channels::SATELLITES),
        Some(&ChannelValue::Integer(9))
    );
}
