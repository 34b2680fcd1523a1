use std::fmt;

use fm_types::Coords2D;

/// Where the tracker is in bringing up the link to the flight controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Still showing the splash screen
    None,
    /// Waiting for a usable fix before talking to the flight controller
    Init,
    HandshakeInProgress,
    /// Polling navigation status and pushing follow waypoints
    Ready,
    /// The flight controller flies a platform we must not follow
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::None => "none",
            ConnectionState::Init => "init",
            ConnectionState::HandshakeInProgress => "wip",
            ConnectionState::Ready => "ready",
            ConnectionState::Failed => "failed",
        };

        f.write_str(label)
    }
}

/// What the flight controller last told us about the vehicle. Only refreshed
/// while [`ConnectionState::Ready`].
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct VehicleTelemetry {
    pub nav_mode: u8,
    pub position: Coords2D,
    pub fix_type: u8,
    pub satellites: u8,
    /// Meters
    pub altitude: i16,
    /// Meters per second
    pub speed: f32,
    /// Degrees
    pub course: f32,
    /// Hundredths
    pub hdop: u16,
}
