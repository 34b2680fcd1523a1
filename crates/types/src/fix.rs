use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::Coords2D;

/// A position report from the handheld GPS receiver, merged from the GGA and
/// RMC sentences of one update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    /// 0 = no fix, 1 = GPS fix, 2 = differential fix
    pub quality: u8,

    /// UTC time of day the fix was taken
    pub time: NaiveTime,

    pub position: Coords2D,

    /// Altitude above mean sea level in meters
    pub altitude: f32,

    pub satellites: u8,

    /// Horizontal dilution of precision
    pub hdop: f32,

    /// Speed over ground in knots
    pub speed: f32,

    /// Course over ground in degrees
    pub heading: f32,
}

impl PositionFix {
    /// Whether this fix is good enough to follow: the receiver reports a fix
    /// and sees at least `min_sats` satellites.
    pub fn is_usable(&self, min_sats: u8) -> bool {
        self.quality > 0 && self.satellites >= min_sats
    }
}
