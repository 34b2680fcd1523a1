//! The subset of MSP command ids the tracker speaks, plus the enumerations
//! carried in their replies.

use std::fmt;

use num_traits::FromPrimitive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u16)]
pub enum MspCommand {
    /// Four character firmware identifier, e.g. `INAV`
    FcVariant = 2,
    /// Firmware major, minor, patch
    FcVersion = 3,
    /// Craft name as set by the pilot
    Name = 10,
    RawGps = 106,
    NavStatus = 121,
    SetWp = 209,
    /// INAV extension: mixer configuration, including the platform type
    InavMixer = 0x2010,
}

impl MspCommand {
    pub fn id(self) -> u16 {
        self as u16
    }

    pub fn from_id(id: u16) -> Option<Self> {
        Self::from_u16(id)
    }
}

/// Vehicle platform reported in the mixer reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u16)]
pub enum PlatformType {
    Multirotor = 0,
    Airplane = 1,
    Helicopter = 2,
    Tricopter = 3,
    Rover = 4,
    Boat = 5,
    Other = 6,
}

/// Navigation mode reported in the nav status reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum NavMode {
    None = 0,
    Hold = 1,
    Rth = 2,
    Nav = 3,
    Emergency = 15,
}

impl NavMode {
    /// Short label for a raw mode byte; unknown modes render as their number.
    pub fn label(mode: u8) -> String {
        match NavMode::from_u8(mode) {
            Some(NavMode::None) => "none".to_owned(),
            Some(NavMode::Hold) => "hold".to_owned(),
            Some(NavMode::Rth) => "rth".to_owned(),
            Some(NavMode::Nav) => "nav".to_owned(),
            Some(NavMode::Emergency) => "emerg".to_owned(),
            None => format!("mode {mode}"),
        }
    }
}

impl fmt::Display for NavMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&NavMode::label(*self as u8))
    }
}

/// Waypoint slots addressed by the set-waypoint command.
pub mod waypoint {
    pub const HOME: u8 = 0;

    /// Slot INAV treats as the follow-me target
    pub const FOLLOW: u8 = 255;

    /// Waypoint action code for a plain waypoint
    pub const ACTION_WAYPOINT: u8 = 1;

    /// Flag marking the last waypoint of a mission; ignored for slot 255
    pub const FLAG_LAST: u8 = 0xA5;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids() {
        assert_eq!(MspCommand::from_id(2), Some(MspCommand::FcVariant));
        assert_eq!(MspCommand::from_id(0x2010), Some(MspCommand::InavMixer));
        assert_eq!(MspCommand::SetWp.id(), 209);
        assert_eq!(MspCommand::from_id(4), None);
    }

    #[test]
    fn nav_mode_labels() {
        assert_eq!(NavMode::label(1), "hold");
        assert_eq!(NavMode::label(42), "mode 42");
        assert_eq!(NavMode::Rth.to_string(), "rth");
    }
}
