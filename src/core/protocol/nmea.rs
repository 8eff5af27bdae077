//! NMEA 0183 sentence codec
//!
//! Stateless helpers for the wire format emitted by GPS receivers:
//!
//! ```text
//! $<talker><type>,<field1>,...,<fieldN>*<checksum>\r\n
//! ```
//!
//! - Checksum verification (XOR of the body, two hex digits after `*`)
//! - Degrees/minutes coordinate decoding with hemisphere sign
//! - Field extraction into a [`Sentence`]

use thiserror::Error;

/// Sentence start marker
pub const SENTENCE_MARKER: char = '$';

/// Checksum delimiter
pub const CHECKSUM_DELIMITER: char = '*';

/// NMEA codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NmeaError {
    /// Line does not start with the sentence marker or has no type tag
    #[error("Invalid sentence format: {0}")]
    InvalidFormat(String),

    /// Checksum present but does not match the body
    #[error("Checksum mismatch: expected {expected:02X}, got {got}")]
    ChecksumMismatch {
        /// Checksum computed over the body
        expected: u8,
        /// Checksum text found after the delimiter
        got: String,
    },
}

/// Calculate the NMEA checksum of a sentence body (without `$` and `*`)
pub fn checksum(body: &str) -> u8 {
    body.bytes().fold(0u8, |acc, b| acc ^ b)
}

/// Strip the leading marker, if any
fn strip_marker(sentence: &str) -> &str {
    sentence.strip_prefix(SENTENCE_MARKER).unwrap_or(sentence)
}

/// Verify the checksum of a sentence.
///
/// Sentences without a `*` delimiter are accepted: the checksum is optional on
/// the wire and this codec runs permissive. When a delimiter is present, the
/// XOR of every byte between the marker and the delimiter must match the
/// trailing hex text (case-insensitive).
pub fn verify_checksum(sentence: &str) -> bool {
    match checksum_parts(sentence) {
        None => true,
        Some((body, trailing)) => {
            let expected = format!("{:02X}", checksum(body));
            trailing.trim().eq_ignore_ascii_case(&expected)
        }
    }
}

fn checksum_parts(sentence: &str) -> Option<(&str, &str)> {
    let sentence = strip_marker(sentence);
    let star = sentence.find(CHECKSUM_DELIMITER)?;
    Some((&sentence[..star], &sentence[star + 1..]))
}

/// Hemisphere indicator of a coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    /// North (latitude, positive)
    North,
    /// South (latitude, negative)
    South,
    /// East (longitude, positive)
    East,
    /// West (longitude, negative)
    West,
}

impl Hemisphere {
    /// Parse a hemisphere letter (`N`, `S`, `E`, `W`)
    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter.trim() {
            "N" => Some(Self::North),
            "S" => Some(Self::South),
            "E" => Some(Self::East),
            "W" => Some(Self::West),
            _ => None,
        }
    }

    /// Width of the integer-degree prefix: `DDMM.mmm` or `DDDMM.mmm`
    pub fn degree_width(self) -> usize {
        match self {
            Self::North | Self::South => 2,
            Self::East | Self::West => 3,
        }
    }

    /// Sign applied to decimal degrees
    pub fn sign(self) -> f64 {
        match self {
            Self::North | Self::East => 1.0,
            Self::South | Self::West => -1.0,
        }
    }
}

/// Geographic coordinate in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    /// Unsigned decimal degrees
    pub degrees: f64,
    /// Hemisphere the value lies in
    pub hemisphere: Hemisphere,
}

impl Coordinate {
    /// Signed decimal degrees (negative for S/W)
    pub fn to_decimal(&self) -> f64 {
        self.hemisphere.sign() * self.degrees
    }
}

/// Decode a degrees-minutes field into a [`Coordinate`].
///
/// Returns `None` (never a zero default) when the raw text is empty, has no
/// decimal point, is shorter than the fixed degree width, the hemisphere letter
/// is unknown, or either part fails to parse.
pub fn decode_coordinate(raw: &str, hemisphere: &str) -> Option<Coordinate> {
    let hemisphere = Hemisphere::from_letter(hemisphere)?;
    let raw = raw.trim();
    let width = hemisphere.degree_width();

    if raw.is_empty() || !raw.contains('.') || raw.len() < width {
        return None;
    }

    let degree_text = raw.get(..width)?;
    let minute_text = raw.get(width..)?;
    if !degree_text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let degrees: f64 = degree_text.parse().ok()?;
    let minutes: f64 = minute_text.parse().ok().filter(|m: &f64| m.is_finite())?;

    Some(Coordinate {
        degrees: degrees + minutes / 60.0,
        hemisphere,
    })
}

/// One checksum-verified NMEA sentence split into fields.
///
/// Field 0 is the type tag (`GPGGA`), data fields start at index 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Sentence {
    fields: Vec<String>,
    checksum: Option<u8>,
}

impl Sentence {
    /// Parse and validate a sentence.
    ///
    /// The text must start with `$`; if a checksum is present it must match.
    pub fn parse(text: &str) -> Result<Self, NmeaError> {
        let text = text.trim_end_matches(|c: char| c.is_ascii_control() || c == ' ');
        if !text.starts_with(SENTENCE_MARKER) {
            return Err(NmeaError::InvalidFormat(text.to_string()));
        }

        let (body, checksum) = match checksum_parts(text) {
            Some((body, trailing)) => {
                let expected = checksum(body);
                if !verify_checksum(text) {
                    return Err(NmeaError::ChecksumMismatch {
                        expected,
                        got: trailing.trim().to_string(),
                    });
                }
                (body, Some(expected))
            }
            None => (strip_marker(text), None),
        };

        let fields: Vec<String> = body.split(',').map(str::to_string).collect();
        if fields.first().map_or(true, |tag| tag.is_empty()) {
            return Err(NmeaError::InvalidFormat(text.to_string()));
        }

        Ok(Self { fields, checksum })
    }

    /// Type tag including talker ID, e.g. `GPGGA`
    pub fn tag(&self) -> &str {
        self.field(0)
    }

    /// Talker ID (first two characters of the tag)
    pub fn talker(&self) -> &str {
        self.tag().get(..2).unwrap_or("")
    }

    /// Whether the tag ends with the given sentence type (`GGA`, `RMC`).
    /// Case-sensitive, tolerant of any talker prefix.
    pub fn is_type(&self, sentence_type: &str) -> bool {
        self.tag().ends_with(sentence_type)
    }

    /// Raw text of a field; absent fields read as empty
    pub fn field(&self, index: usize) -> &str {
        self.fields.get(index).map_or("", String::as_str)
    }

    /// Number of fields including the tag
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always false: a parsed sentence has at least its tag
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Checksum byte, when the sentence carried one
    pub fn checksum(&self) -> Option<u8> {
        self.checksum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GGA: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";

    #[test]
    fn test_checksum() {
        let cs = checksum("GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,");
        assert_eq!(cs, 0x47);
    }

    #[test]
    fn test_verify_checksum_roundtrip() {
        let payload = "GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W";
        let sentence = format!("${}*{:02X}", payload, checksum(payload));
        assert!(verify_checksum(&sentence));

        // Flip each hex digit of the checksum
        let star = sentence.find('*').unwrap();
        for pos in [star + 1, star + 2] {
            let mut bytes = sentence.clone().into_bytes();
            bytes[pos] = if bytes[pos] == b'0' { b'1' } else { b'0' };
            let flipped = String::from_utf8(bytes).unwrap();
            assert!(!verify_checksum(&flipped), "{flipped}");
        }
    }

    #[test]
    fn test_verify_checksum_case_insensitive() {
        let payload = "GNRMC,083559.00,A,3346.1234,S,15112.5678,E,0.000,,150624,,,A";
        assert_eq!(checksum(payload), 0x79);
        let sentence = "$GPGSV,3,1,11,03,03,111,00,04,15,270,00,06,01,010,00,13,06,292,00*74";
        assert!(verify_checksum(sentence));
        assert!(verify_checksum("$GPGGA,123519,,,,,0,00,,,M,,M,,*6b"));
    }

    #[test]
    fn test_missing_checksum_is_accepted() {
        assert!(verify_checksum("$GPGGA,123519,4807.038,N"));
    }

    #[test]
    fn test_decode_coordinate() {
        let lat = decode_coordinate("4807.038", "N").unwrap();
        assert!((lat.to_decimal() - (48.0 + 7.038 / 60.0)).abs() < 1e-12);

        let lon = decode_coordinate("01131.000", "E").unwrap();
        assert!((lon.to_decimal() - (11.0 + 31.0 / 60.0)).abs() < 1e-12);

        let south = decode_coordinate("4807.038", "S").unwrap();
        assert!(south.to_decimal() < 0.0);
        let west = decode_coordinate("01131.000", "W").unwrap();
        assert!((west.to_decimal() + (11.0 + 31.0 / 60.0)).abs() < 1e-12);
    }

    #[test]
    fn test_decode_coordinate_invalid() {
        assert_eq!(decode_coordinate("", "N"), None);
        assert_eq!(decode_coordinate("48", "N"), None);
        assert_eq!(decode_coordinate("4807", "N"), None);
        assert_eq!(decode_coordinate("4807.038", ""), None);
        assert_eq!(decode_coordinate("48x7.038", "N"), None);
        assert_eq!(decode_coordinate("4807.0x8", "N"), None);
        assert_eq!(decode_coordinate("481.e400", "N"), None);
        // Longitude needs three degree digits before the minutes
        assert_eq!(decode_coordinate("1.5", "E"), None);
    }

    #[test]
    fn test_sentence_parse() {
        let sentence = Sentence::parse(GGA).unwrap();
        assert_eq!(sentence.tag(), "GPGGA");
        assert_eq!(sentence.talker(), "GP");
        assert!(sentence.is_type("GGA"));
        assert!(!sentence.is_type("gga"));
        assert_eq!(sentence.field(2), "4807.038");
        assert_eq!(sentence.field(7), "08");
        assert_eq!(sentence.field(99), "");
        assert_eq!(sentence.checksum(), Some(0x47));
    }

    #[test]
    fn test_sentence_parse_trims_terminator() {
        let line = format!("{GGA}\r\n");
        let sentence = Sentence::parse(&line).unwrap();
        assert_eq!(sentence.checksum(), Some(0x47));
    }

    #[test]
    fn test_sentence_parse_rejects() {
        assert!(matches!(
            Sentence::parse("GPGGA,123519*47"),
            Err(NmeaError::InvalidFormat(_))
        ));
        assert!(matches!(
            Sentence::parse("$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*48"),
            Err(NmeaError::ChecksumMismatch { expected: 0x47, .. })
        ));
        assert!(matches!(Sentence::parse("$"), Err(NmeaError::InvalidFormat(_))));
    }
}
