//! Builders and parsers for the payloads of the commands in [`MspCommand`].
//!
//! Parsers return `None` when a payload is shorter than its fixed layout; a
//! short reply is a protocol error the caller logs and ignores.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use fm_types::Coords2D;
use num_traits::FromPrimitive;

use crate::{
    command::{waypoint, PlatformType},
    MspCommand, MspRequest,
};

/// Length of the set-waypoint payload.
pub const WAYPOINT_LEN: usize = 21;

/// A waypoint to push to the flight controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    /// Slot number: [`waypoint::HOME`] or [`waypoint::FOLLOW`]
    pub index: u8,
    pub position: Coords2D,
    /// Heading in whole degrees
    pub bearing: u16,
}

impl Waypoint {
    /// Layout: index, action, lat ×1e7, lon ×1e7, altitude (0 = keep),
    /// p1 (heading), p2, p3, flag.
    pub fn to_payload(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(WAYPOINT_LEN);

        buf.put_u8(self.index);
        buf.put_u8(waypoint::ACTION_WAYPOINT);
        buf.put_i32_le(to_e7(self.position.latitude));
        buf.put_i32_le(to_e7(self.position.longitude));
        buf.put_i32_le(0);
        buf.put_u16_le(self.bearing);
        buf.put_u16_le(0);
        buf.put_u16_le(0);
        buf.put_u8(waypoint::FLAG_LAST);

        buf.freeze()
    }

    pub fn to_request(&self) -> MspRequest {
        MspRequest::with_payload(MspCommand::SetWp, self.to_payload())
    }
}

fn to_e7(degrees: f32) -> i32 {
    (f64::from(degrees) * 1e7).round() as i32
}

fn from_e7(value: i32) -> f32 {
    (f64::from(value) / 1e7) as f32
}

/// Firmware identifier from the variant reply, e.g. `INAV`.
pub fn parse_variant(payload: &[u8]) -> Option<&str> {
    payload.get(..4).and_then(|id| std::str::from_utf8(id).ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl FirmwareVersion {
    pub fn parse(payload: &[u8]) -> Option<Self> {
        match payload {
            [major, minor, patch, ..] => Some(FirmwareVersion {
                major: *major,
                minor: *minor,
                patch: *patch,
            }),
            _ => None,
        }
    }
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Craft name; not null terminated.
pub fn parse_name(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload).into_owned()
}

/// Raw platform type code from the INAV mixer reply (bytes 3..5).
pub fn parse_platform_type(payload: &[u8]) -> Option<u16> {
    let mut buf = payload.get(3..5)?;
    Some(buf.get_u16_le())
}

pub fn platform_name(code: u16) -> String {
    match PlatformType::from_u16(code) {
        Some(platform) => format!("{platform:?}").to_lowercase(),
        None => format!("platform {code}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavStatus {
    pub mode: u8,
    pub state: u8,
    pub action: u8,
    pub waypoint: u8,
    pub error: u8,
}

impl NavStatus {
    pub fn parse(payload: &[u8]) -> Option<Self> {
        match payload {
            [mode, rest @ ..] => Some(NavStatus {
                mode: *mode,
                state: rest.first().copied().unwrap_or(0),
                action: rest.get(1).copied().unwrap_or(0),
                waypoint: rest.get(2).copied().unwrap_or(0),
                error: rest.get(3).copied().unwrap_or(0),
            }),
            [] => None,
        }
    }
}

/// HDOP reported when the flight controller does not send one.
pub const HDOP_UNKNOWN: u16 = 999;

/// Raw GPS telemetry as seen by the flight controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawGps {
    pub fix_type: u8,
    pub satellites: u8,
    pub position: Coords2D,
    /// Meters
    pub altitude: i16,
    /// Meters per second
    pub speed: f32,
    /// Degrees
    pub course: f32,
    /// Hundredths
    pub hdop: u16,
}

impl RawGps {
    const MIN_LEN: usize = 16;

    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < Self::MIN_LEN {
            return None;
        }

        let mut buf = payload;
        let fix_type = buf.get_u8();
        let satellites = buf.get_u8();
        let latitude = from_e7(buf.get_i32_le());
        let longitude = from_e7(buf.get_i32_le());
        let altitude = buf.get_i16_le();
        let speed = f32::from(buf.get_u16_le()) / 100.0;
        let course = f32::from(buf.get_u16_le()) / 10.0;
        let hdop = if buf.remaining() >= 2 {
            buf.get_u16_le()
        } else {
            HDOP_UNKNOWN
        };

        Some(RawGps {
            fix_type,
            satellites,
            position: Coords2D::new(latitude, longitude),
            altitude,
            speed,
            course,
            hdop,
        })
    }

    /// Builds the payload a flight controller would send. Used to simulate
    /// one.
    pub fn to_payload(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(18);

        buf.put_u8(self.fix_type);
        buf.put_u8(self.satellites);
        buf.put_i32_le(to_e7(self.position.latitude));
        buf.put_i32_le(to_e7(self.position.longitude));
        buf.put_i16_le(self.altitude);
        buf.put_u16_le((self.speed * 100.0) as u16);
        buf.put_u16_le((self.course * 10.0) as u16);
        buf.put_u16_le(self.hdop);

        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waypoint_layout() {
        let wp = Waypoint {
            index: waypoint::FOLLOW,
            position: Coords2D::new(-33.868_72, 151.208_33),
            bearing: 271,
        };

        let payload = wp.to_payload();
        assert_eq!(payload.len(), WAYPOINT_LEN);

        let mut buf = &payload[..];
        assert_eq!(buf.get_u8(), 255);
        assert_eq!(buf.get_u8(), 1);
        assert!((buf.get_i32_le() - -338_687_200).abs() <= 20);
        assert!((buf.get_i32_le() - 1_512_083_300).abs() <= 100);
        assert_eq!(buf.get_i32_le(), 0);
        assert_eq!(buf.get_u16_le(), 271);
        assert_eq!(buf.get_u16_le(), 0);
        assert_eq!(buf.get_u16_le(), 0);
        assert_eq!(buf.get_u8(), 0xA5);
        assert!(!buf.has_remaining());

        let request = wp.to_request();
        assert_eq!(request.command(), Some(MspCommand::SetWp));
    }

    #[test]
    fn variant_and_version() {
        assert_eq!(parse_variant(b"INAV"), Some("INAV"));
        assert_eq!(parse_variant(b"BTFL\x00"), Some("BTFL"));
        assert_eq!(parse_variant(b"IN"), None);

        let version = FirmwareVersion::parse(&[6, 1, 0]).unwrap();
        assert_eq!(version.to_string(), "6.1.0");
        assert_eq!(FirmwareVersion::parse(&[7]), None);
    }

    #[test]
    fn platform_type_from_mixer_reply() {
        // yaw motor direction, yaw jump prevention (u16), platform type (u16), ...
        let payload = [0, 0, 0, 1, 0, 0, 0, 0, 0];
        assert_eq!(parse_platform_type(&payload), Some(1));
        assert_eq!(platform_name(1), "airplane");
        assert_eq!(platform_name(77), "platform 77");
        assert_eq!(parse_platform_type(&[0, 0, 0, 1]), None);
    }

    #[test]
    fn nav_status() {
        assert_eq!(NavStatus::parse(&[1, 2, 3, 4, 5]).map(|s| s.mode), Some(1));
        assert_eq!(NavStatus::parse(&[3]).map(|s| s.error), Some(0));
        assert_eq!(NavStatus::parse(&[]), None);
    }

    #[test]
    fn raw_gps_with_and_without_hdop() {
        let gps = RawGps {
            fix_type: 2,
            satellites: 14,
            position: Coords2D::new(50.912_3, -1.405_6),
            altitude: 37,
            speed: 1.5,
            course: 90.5,
            hdop: 120,
        };

        let payload = gps.to_payload();
        let parsed = RawGps::parse(&payload).unwrap();
        assert_eq!(parsed.satellites, 14);
        assert_eq!(parsed.hdop, 120);
        assert!((parsed.position.latitude - 50.912_3).abs() < 1e-5);
        assert!((parsed.course - 90.5).abs() < 1e-3);

        let short = RawGps::parse(&payload[..16]).unwrap();
        assert_eq!(short.hdop, HDOP_UNKNOWN);

        // a 17th byte on its own is not enough for an HDOP
        assert_eq!(RawGps::parse(&payload[..17]).unwrap().hdop, HDOP_UNKNOWN);
        assert_eq!(RawGps::parse(&payload[..15]), None);
    }
}
