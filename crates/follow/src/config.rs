use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct FollowConfig {
    /// Minimum satellites the handheld receiver must see before following
    #[serde(default = "default_min_sats")]
    pub min_sats: u8,

    /// Meters the handheld must move away from the vehicle before the
    /// follow waypoint is moved
    #[serde(default = "default_min_follow_distance")]
    pub min_follow_distance: f32,

    #[serde(default)]
    pub reset_home: bool,

    /// Platform type codes (from the mixer reply) that must never be told to
    /// follow
    #[serde(default = "default_dont_follow")]
    pub dont_follow: Vec<u16>,

    /// Battery voltage calibration offset in volts
    #[serde(default = "default_vbat_offset")]
    pub vbat_offset: f32,

    /// Period of the control loop tick, in milliseconds. All the timeouts
    /// below are counted in ticks.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default = "default_splash_ticks")]
    pub splash_ticks: u64,

    #[serde(default = "default_gps_timeout_ticks")]
    pub gps_timeout_ticks: u64,

    #[serde(default = "default_handshake_timeout_ticks")]
    pub handshake_timeout_ticks: u64,

    #[serde(default = "default_nav_timeout_ticks")]
    pub nav_timeout_ticks: u64,
}

impl Default for FollowConfig {
    fn default() -> Self {
        FollowConfig {
            min_sats: default_min_sats(),
            min_follow_distance: default_min_follow_distance(),
            reset_home: false,
            dont_follow: default_dont_follow(),
            vbat_offset: default_vbat_offset(),
            tick_ms: default_tick_ms(),
            splash_ticks: default_splash_ticks(),
            gps_timeout_ticks: default_gps_timeout_ticks(),
            handshake_timeout_ticks: default_handshake_timeout_ticks(),
            nav_timeout_ticks: default_nav_timeout_ticks(),
        }
    }
}

fn default_min_sats() -> u8 {
    6
}

fn default_min_follow_distance() -> f32 {
    2.0
}

fn default_dont_follow() -> Vec<u16> {
    // fixed wing
    vec![1]
}

fn default_vbat_offset() -> f32 {
    0.8
}

fn default_tick_ms() -> u64 {
    100
}

fn default_splash_ticks() -> u64 {
    50
}

fn default_gps_timeout_ticks() -> u64 {
    600
}

fn default_handshake_timeout_ticks() -> u64 {
    600
}

fn default_nav_timeout_ticks() -> u64 {
    100
}
