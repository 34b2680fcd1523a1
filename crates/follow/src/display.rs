use chrono::NaiveTime;

use crate::ConnectionState;

/// Rows of the status display that can be cleared individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayRow {
    Time,
    Gps,
    Firmware,
    VehicleSats,
    VehiclePosition,
}

/// Something for the status display to render.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    /// The splash delay is over
    Initialised,
    GpsFix {
        time: NaiveTime,
        satellites: u8,
        quality: u8,
    },
    Mode {
        connection: ConnectionState,
        nav_mode: u8,
    },
    FirmwareVersion(String),
    VehicleSats {
        satellites: u8,
        hdop: u16,
    },
    /// Distance (meters) and bearing (degrees) from the vehicle to the
    /// handheld
    VehiclePosition {
        distance: f32,
        bearing: u16,
    },
    Clear(DisplayRow),
}
