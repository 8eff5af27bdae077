//! Fix decoder for position sentences
//!
//! Turns checksum-verified GGA and RMC sentences into a [`FixRecord`] and the
//! set of channel updates derived from it. Other sentence types are
//! acknowledged and ignored.
//!
//! Numeric fields that are empty or non-numeric read as zero. Coordinates are
//! the exception: an invalid coordinate suppresses the position updates
//! instead of publishing a bogus 0/0.

use crate::core::protocol::nmea::{decode_coordinate, Sentence};
use crate::core::publisher::ChannelValue;
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

/// Channel identifiers published by the decoder
pub mod channels {
    /// Signed decimal latitude
    pub const LATITUDE: &str = "position.latitude";
    /// Signed decimal longitude
    pub const LONGITUDE: &str = "position.longitude";
    /// `"lat;lon"` text
    pub const LAT_LON: &str = "position.latLon";
    /// `"lon;lat"` text
    pub const LON_LAT: &str = "position.lonLat";
    /// Satellites used in the fix
    pub const SATELLITES: &str = "position.satellites";
    /// Horizontal dilution of precision
    pub const HDOP: &str = "position.hdop";
    /// Altitude above mean sea level, metres
    pub const ALTITUDE: &str = "position.altitude";
    /// Speed over ground, km/h
    pub const SPEED: &str = "position.speed";
    /// Course over ground, degrees
    pub const COURSE: &str = "position.course";
    /// Link liveness and fix validity
    pub const CONNECTION: &str = "info.connection";
}

/// Knots to km/h
pub const KNOTS_TO_KMH: f64 = 1.852;

/// GGA fix quality indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FixQuality {
    /// 0: no fix
    #[default]
    Invalid,
    /// 1: standalone GPS
    GpsFix,
    /// 2: differential GPS
    DgpsFix,
    /// 3: PPS fix
    PpsFix,
    /// 4: RTK with fixed integers
    Rtk,
    /// 5: RTK with float integers
    FloatRtk,
    /// 6: dead reckoning
    Estimated,
    /// 7: manual input
    Manual,
    /// 8: simulator
    Simulation,
    /// Indicator outside 0..=8
    Other(u8),
}

impl From<u8> for FixQuality {
    fn from(v: u8) -> Self {
        match v {
            0 => Self::Invalid,
            1 => Self::GpsFix,
            2 => Self::DgpsFix,
            3 => Self::PpsFix,
            4 => Self::Rtk,
            5 => Self::FloatRtk,
            6 => Self::Estimated,
            7 => Self::Manual,
            8 => Self::Simulation,
            other => Self::Other(other),
        }
    }
}

/// Fields decoded from one sentence. Absent fields were not carried by the
/// sentence type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FixRecord {
    /// Sentence tag, talker included (`GPGGA`, `GNRMC`)
    pub sentence_type: String,
    /// Decimal degrees, south negative
    pub latitude: Option<f64>,
    /// Decimal degrees, west negative
    pub longitude: Option<f64>,
    /// GGA fix indicator
    pub fix_quality: Option<FixQuality>,
    /// Satellites in use
    pub satellites: Option<u32>,
    /// HDOP
    pub horizontal_dilution: Option<f64>,
    /// Meters above mean sea level
    pub altitude: Option<f64>,
    /// km/h, rounded to two decimals
    pub speed: Option<f64>,
    /// Degrees true
    pub course: Option<f64>,
    /// GGA indicator above zero, or RMC status `A`
    pub fix_valid: bool,
    /// UTC time of fix
    pub utc_time: Option<NaiveTime>,
    /// RMC date
    pub date: Option<NaiveDate>,
}

impl FixRecord {
    /// Channel updates for this record, in publish order
    pub fn updates(&self) -> Vec<(&'static str, ChannelValue)> {
        let mut updates = Vec::with_capacity(10);

        if let (Some(lat), Some(lon)) = (self.latitude, self.longitude) {
            updates.push((channels::LATITUDE, ChannelValue::Number(lat)));
            updates.push((channels::LONGITUDE, ChannelValue::Number(lon)));
            updates.push((channels::LAT_LON, ChannelValue::Text(format!("{lat};{lon}"))));
            updates.push((channels::LON_LAT, ChannelValue::Text(format!("{lon};{lat}"))));
        }
        if let Some(satellites) = self.satellites {
            updates.push((channels::SATELLITES, ChannelValue::Integer(i64::from(satellites))));
        }
        if let Some(hdop) = self.horizontal_dilution {
            updates.push((channels::HDOP, ChannelValue::Number(hdop)));
        }
        if let Some(altitude) = self.altitude {
            updates.push((channels::ALTITUDE, ChannelValue::Number(altitude)));
        }
        if let Some(speed) = self.speed {
            updates.push((channels::SPEED, ChannelValue::Number(speed)));
        }
        if let Some(course) = self.course {
            updates.push((channels::COURSE, ChannelValue::Number(course)));
        }
        updates.push((channels::CONNECTION, ChannelValue::Bool(self.fix_valid)));

        updates
    }
}

fn int_or_zero(field: &str) -> u32 {
    field.trim().parse().unwrap_or(0)
}

/// `NaN` and `inf` parse as floats but are not numbers on the wire
fn float_or_zero(field: &str) -> f64 {
    field
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Parse time from HHMMSS.sss format
fn parse_time(s: &str) -> Option<NaiveTime> {
    let hours: u32 = s.get(0..2)?.parse().ok()?;
    let minutes: u32 = s.get(2..4)?.parse().ok()?;
    let seconds: f64 = s.get(4..)?.parse().ok()?;

    let secs = seconds.floor() as u32;
    let nanos = ((seconds - seconds.floor()) * 1_000_000_000.0) as u32;

    NaiveTime::from_hms_nano_opt(hours, minutes, secs, nanos)
}

/// Parse date from DDMMYY format
fn parse_date(s: &str) -> Option<NaiveDate> {
    let day: u32 = s.get(0..2)?.parse().ok()?;
    let month: u32 = s.get(2..4)?.parse().ok()?;
    let year: i32 = s.get(4..6)?.parse().ok()?;

    // Two-digit year: 81-99 is the 1900s
    let full_year = if year > 80 { 1900 + year } else { 2000 + year };

    NaiveDate::from_ymd_opt(full_year, month, day)
}

/// Stateless dispatcher from sentence type to decoder
#[derive(Debug, Default, Clone, Copy)]
pub struct FixDecoder;

impl FixDecoder {
    /// Create a decoder
    pub fn new() -> Self {
        Self
    }

    /// Decode a verified sentence. `None` for sentence types without a decoder.
    pub fn decode(&self, sentence: &Sentence) -> Option<FixRecord> {
        if sentence.is_type("GGA") {
            Some(Self::decode_gga(sentence))
        } else if sentence.is_type("RMC") {
            Some(Self::decode_rmc(sentence))
        } else {
            tracing::trace!(
                "Ignoring sentence type {} from talker {}",
                sentence.tag(),
                sentence.talker()
            );
            None
        }
    }

    fn position(sentence: &Sentence, lat: usize, lon: usize) -> (Option<f64>, Option<f64>) {
        let latitude = decode_coordinate(sentence.field(lat), sentence.field(lat + 1));
        let longitude = decode_coordinate(sentence.field(lon), sentence.field(lon + 1));
        match (latitude, longitude) {
            (Some(lat), Some(lon)) => (Some(lat.to_decimal()), Some(lon.to_decimal())),
            _ => {
                tracing::debug!("No valid position in {}", sentence.tag());
                (None, None)
            }
        }
    }

    fn decode_gga(sentence: &Sentence) -> FixRecord {
        let (latitude, longitude) = Self::position(sentence, 2, 4);
        let indicator = int_or_zero(sentence.field(6));
        let fix_quality = FixQuality::from(u8::try_from(indicator).unwrap_or(u8::MAX));

        FixRecord {
            sentence_type: sentence.tag().to_string(),
            latitude,
            longitude,
            fix_quality: Some(fix_quality),
            satellites: Some(int_or_zero(sentence.field(7))),
            horizontal_dilution: Some(float_or_zero(sentence.field(8))),
            altitude: Some(float_or_zero(sentence.field(9))),
            fix_valid: indicator > 0,
            utc_time: parse_time(sentence.field(1)),
            ..FixRecord::default()
        }
    }

    fn decode_rmc(sentence: &Sentence) -> FixRecord {
        let (latitude, longitude) = Self::position(sentence, 3, 5);
        let knots = float_or_zero(sentence.field(7));
        let speed = (knots * KNOTS_TO_KMH * 100.0).round() / 100.0;

        FixRecord {
            sentence_type: sentence.tag().to_string(),
            latitude,
            longitude,
            speed: Some(speed),
            course: Some(float_or_zero(sentence.field(8))),
            fix_valid: sentence.field(2) == "A",
            utc_time: parse_time(sentence.field(1)),
            date: parse_date(sentence.field(9)),
            ..FixRecord::default()
        }
    }
}
