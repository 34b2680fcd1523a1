//! Validation and field decoding for the two NMEA 0183 sentences the tracker
//! consumes: `GGA` (fix data) and `RMC` (recommended minimum).

use chrono::NaiveTime;
use fm_types::Coords2D;

/// Number of comma-separated fields in a GGA sentence, counting the address.
const GGA_FIELDS: usize = 15;

/// Number of comma-separated fields in an RMC sentence, counting the address.
const RMC_FIELDS: usize = 13;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gga {
    pub time: Option<NaiveTime>,
    pub position: Coords2D,
    pub quality: u8,
    pub satellites: u8,
    pub hdop: f32,
    pub altitude: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rmc {
    pub time: Option<NaiveTime>,
    pub position: Coords2D,
    /// Knots
    pub speed: f32,
    /// Degrees true
    pub heading: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sentence {
    Gga(Gga),
    Rmc(Rmc),
}

impl Sentence {
    pub fn time(&self) -> Option<NaiveTime> {
        match self {
            Sentence::Gga(gga) => gga.time,
            Sentence::Rmc(rmc) => rmc.time,
        }
    }
}

/// XOR of every byte, as used between `$` and `*`.
pub fn checksum(body: &[u8]) -> u8 {
    body.iter().fold(0, |acc, b| acc ^ b)
}

/// A sentence is well formed if it starts with `$`, has `*` as its third to
/// last character, and the two hex digits after the `*` match the checksum of
/// everything in between.
pub fn is_valid(sentence: &str) -> bool {
    let bytes = sentence.as_bytes();

    if bytes.len() <= 6 || bytes[0] != b'$' || bytes[bytes.len() - 3] != b'*' {
        return false;
    }

    let body = &bytes[1..bytes.len() - 3];
    let hex = &bytes[bytes.len() - 2..];
    if !hex.iter().all(u8::is_ascii_hexdigit) {
        return false;
    }

    let expected = match std::str::from_utf8(hex)
        .ok()
        .and_then(|hex| u8::from_str_radix(hex, 16).ok())
    {
        Some(expected) => expected,
        None => return false,
    };

    checksum(body) == expected
}

/// Parses a complete sentence (without the trailing CR LF). Returns `None` for
/// anything that fails validation, has the wrong number of fields, or is not
/// a sentence type we use.
pub fn parse(sentence: &str) -> Option<Sentence> {
    if !is_valid(sentence) {
        return None;
    }

    // the talker id (GP, GN, GL, ...) is irrelevant
    let kind = sentence.get(3..6)?;
    let fields: Vec<&str> = sentence.split(',').collect();

    match kind {
        "GGA" => {
            if fields.len() != GGA_FIELDS {
                return None;
            }

            Some(Sentence::Gga(Gga {
                time: parse_time(fields[1]),
                position: Coords2D::new(
                    parse_coordinate(fields[2], fields[3], 2),
                    parse_coordinate(fields[4], fields[5], 3),
                ),
                quality: fields[6]
                    .chars()
                    .next()
                    .and_then(|c| c.to_digit(10))
                    .map_or(0, |q| q as u8),
                satellites: fields[7].parse().unwrap_or(0),
                hdop: parse_f32(fields[8]),
                altitude: parse_f32(fields[9]),
            }))
        }
        "RMC" => {
            if fields.len() != RMC_FIELDS {
                return None;
            }

            Some(Sentence::Rmc(Rmc {
                time: parse_time(fields[1]),
                position: Coords2D::new(
                    parse_coordinate(fields[3], fields[4], 2),
                    parse_coordinate(fields[5], fields[6], 3),
                ),
                speed: parse_f32(fields[7]),
                heading: parse_f32(fields[8]),
            }))
        }
        _ => None,
    }
}

/// Decodes `DDMM.MMMM` / `DDDMM.MMMM` into signed decimal degrees.
/// `degree_width` is 2 for latitude and 3 for longitude. Anything that does
/// not parse decodes as 0.
pub fn parse_coordinate(value: &str, hemisphere: &str, degree_width: usize) -> f32 {
    if value.len() <= 4 || !value.is_ascii() {
        return 0.0;
    }

    let (degrees, minutes) = match (value.get(..degree_width), value.get(degree_width..)) {
        (Some(degrees), Some(minutes)) => (degrees, minutes),
        _ => return 0.0,
    };

    let (degrees, minutes) = match (degrees.parse::<f64>(), minutes.parse::<f64>()) {
        (Ok(degrees), Ok(minutes)) => (degrees, minutes),
        _ => return 0.0,
    };

    let value = (degrees + minutes / 60.0) as f32;

    match hemisphere {
        "S" | "W" => -value,
        _ => value,
    }
}

/// Decodes `HHMMSS` with optional fractional seconds (`HHMMSS.ff`).
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    // receivers only send ASCII, so byte offsets are char offsets
    if value.len() < 6 || !value.is_ascii() {
        return None;
    }

    let hour = value[0..2].parse().ok()?;
    let minute = value[2..4].parse().ok()?;
    let second = value[4..6].parse().ok()?;

    let nanos = match value[6..].strip_prefix('.') {
        Some(fraction) if !fraction.is_empty() => {
            let digits = &fraction[..fraction.len().min(9)];
            let scale = 10u32.pow(9 - digits.len() as u32);
            digits.parse::<u32>().ok()? * scale
        }
        _ => 0,
    };

    NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)
}

fn parse_f32(value: &str) -> f32 {
    value.parse().unwrap_or(0.0)
}
