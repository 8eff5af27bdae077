//! NMEA 0183 protocol support
//!
//! - Sentence codec (checksum, coordinates, field extraction)
//! - Line framing of raw serial chunks

pub mod framing;
pub mod nmea;

pub use framing::{split_sentences, FramedLine, LineFramer};
pub use nmea::{
    checksum, decode_coordinate, verify_checksum, Coordinate, Hemisphere, NmeaError, Sentence,
};
