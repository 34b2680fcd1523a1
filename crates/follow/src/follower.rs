use fm_geodesy::bearing_and_distance_between;
use fm_msp::{
    command::{waypoint, NavMode},
    payload::{self, FirmwareVersion, NavStatus, RawGps, Waypoint},
    MspCommand, MspMessage, MspRequest,
};
use fm_types::{PositionFix, RuntimeConfig};
use tracing::*;

use crate::{ConnectionState, DisplayEvent, DisplayRow, FollowConfig, VehicleTelemetry};

/// Firmware identifier the handshake insists on.
pub const EXPECTED_VARIANT: &str = "INAV";

/// The mode display is refreshed every this many ticks.
const MODE_DISPLAY_TICKS: u64 = 10;

/// Vehicle satellites are shown for every this many raw GPS replies.
const SATS_DISPLAY_DECIMATION: u64 = 10;

/// Vehicle telemetry is logged for every this many raw GPS replies.
const TELEMETRY_LOG_DECIMATION: u64 = 100;

/// Something the follow task should do on behalf of the [`Follower`].
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Send(MspRequest),
    Display(DisplayEvent),
}

/// The follow-me control state machine.
///
/// It performs no I/O: each event handler returns the requests to send and
/// the display updates to make, in order. Time is measured in ticks, which
/// the caller drives by calling [`Follower::on_tick`] once per tick period.
#[derive(Debug)]
pub struct Follower {
    config: FollowConfig,
    runtime: RuntimeConfig,
    state: ConnectionState,
    vehicle: VehicleTelemetry,

    ticks: u64,
    /// Tick of the last position fix
    fix_tick: u64,
    /// Tick of the last accepted flight controller reply
    msp_tick: u64,
    /// Raw GPS replies since the connection became ready
    raw_gps_count: u64,
}

impl Follower {
    pub fn new(config: FollowConfig, runtime: RuntimeConfig) -> Self {
        Follower {
            config,
            runtime,
            state: ConnectionState::None,
            vehicle: VehicleTelemetry::default(),
            ticks: 0,
            fix_tick: 0,
            msp_tick: 0,
            raw_gps_count: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn vehicle(&self) -> &VehicleTelemetry {
        &self.vehicle
    }

    pub fn runtime(&self) -> &RuntimeConfig {
        &self.runtime
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn since(&self, tick: u64) -> u64 {
        self.ticks.saturating_sub(tick)
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            info!("connection state {} -> {}", self.state, state);
            self.state = state;
        }
    }

    /// Drops back to waiting for a usable fix, forgetting everything the
    /// flight controller told us.
    fn reset_connection(&mut self) {
        self.set_state(ConnectionState::Init);
        self.vehicle = VehicleTelemetry::default();
        self.raw_gps_count = 0;
    }

    pub fn on_tick(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        self.ticks += 1;

        if self.state == ConnectionState::None {
            if self.ticks >= self.config.splash_ticks {
                debug!("initialised");
                actions.push(Action::Display(DisplayEvent::Initialised));
                self.set_state(ConnectionState::Init);
            }
        } else if self.ticks % MODE_DISPLAY_TICKS == 0 {
            actions.push(self.mode_display());
        }

        if self.since(self.fix_tick) > self.config.gps_timeout_ticks {
            warn!("no position fix from the gps receiver");
            self.fix_tick = self.ticks;
            actions.push(Action::Display(DisplayEvent::Clear(DisplayRow::Time)));
            actions.push(Action::Display(DisplayEvent::Clear(DisplayRow::Gps)));
            actions.push(Action::Display(DisplayEvent::Clear(
                DisplayRow::VehiclePosition,
            )));
        }

        match self.state {
            ConnectionState::HandshakeInProgress => {
                if self.since(self.msp_tick) > self.config.handshake_timeout_ticks {
                    warn!("flight controller handshake timed out");
                    self.msp_tick = self.ticks;
                    self.reset_connection();
                }
            }
            ConnectionState::Ready => {
                if self.since(self.msp_tick) > self.config.nav_timeout_ticks {
                    warn!("flight controller stopped answering");
                    self.reset_connection();
                    for row in [
                        DisplayRow::Firmware,
                        DisplayRow::VehicleSats,
                        DisplayRow::VehiclePosition,
                    ] {
                        actions.push(Action::Display(DisplayEvent::Clear(row)));
                    }
                } else {
                    actions.push(query(MspCommand::NavStatus));
                }
            }
            _ => {}
        }

        actions
    }

    pub fn on_fix(&mut self, fix: PositionFix) -> Vec<Action> {
        let mut actions = Vec::new();

        if self.state == ConnectionState::None {
            return actions;
        }

        self.fix_tick = self.ticks;
        actions.push(Action::Display(DisplayEvent::GpsFix {
            time: fix.time,
            satellites: fix.satellites,
            quality: fix.quality,
        }));

        debug!(
            "{} [{}:{}] quality: {} sats: {} lat: {:.6} lon: {:.6}",
            fix.time.format("%H:%M:%S"),
            self.state,
            self.vehicle.nav_mode,
            fix.quality,
            fix.satellites,
            fix.position.latitude,
            fix.position.longitude
        );

        if fix.is_usable(self.runtime.min_sats) {
            match self.state {
                ConnectionState::Init => {
                    info!("usable fix, starting flight controller handshake");
                    self.set_state(ConnectionState::HandshakeInProgress);
                    self.msp_tick = self.ticks;
                    actions.push(query(MspCommand::FcVariant));
                }
                ConnectionState::Ready => self.follow(&fix, &mut actions),
                _ => {}
            }
        } else if self.state != ConnectionState::Init {
            info!(
                "fix no longer usable (quality {}, {} sats)",
                fix.quality, fix.satellites
            );
            self.reset_connection();
            actions.push(Action::Display(DisplayEvent::Clear(
                DisplayRow::VehiclePosition,
            )));
            actions.push(Action::Display(DisplayEvent::Clear(DisplayRow::VehicleSats)));
        }

        actions
    }

    fn follow(&self, fix: &PositionFix, actions: &mut Vec<Action>) {
        if self.vehicle.nav_mode != NavMode::Hold as u8
            || self.vehicle.position.is_null()
            || fix.position.is_null()
        {
            return;
        }

        let (bearing, distance) = bearing_and_distance_between(self.vehicle.position, fix.position);
        debug!(
            "follow (vehicle -> handheld) {:.6},{:.6} -> {:.6},{:.6} dist: {:.0}m brg: {:.0}",
            self.vehicle.position.latitude,
            self.vehicle.position.longitude,
            fix.position.latitude,
            fix.position.longitude,
            distance,
            bearing
        );

        if distance <= self.config.min_follow_distance {
            return;
        }

        let bearing = bearing as u16;
        actions.push(Action::Send(
            Waypoint {
                index: waypoint::FOLLOW,
                position: fix.position,
                bearing,
            }
            .to_request(),
        ));
        actions.push(Action::Display(DisplayEvent::VehiclePosition {
            distance,
            bearing,
        }));

        if self.runtime.reset_home {
            actions.push(Action::Send(
                Waypoint {
                    index: waypoint::HOME,
                    position: fix.position,
                    bearing,
                }
                .to_request(),
            ));
        }
    }

    pub fn on_message(&mut self, msg: &MspMessage) -> Vec<Action> {
        let mut actions = Vec::new();

        if !msg.is_ok() {
            debug!(
                "ignoring msp frame for command {} (valid: {}, direction: {:?})",
                msg.command, msg.valid, msg.direction
            );
            return actions;
        }

        self.msp_tick = self.ticks;

        let command = match msg.command() {
            Some(command) => command,
            None => {
                debug!("ignoring reply to unknown msp command {}", msg.command);
                return actions;
            }
        };

        let handshaking = self.state == ConnectionState::HandshakeInProgress;
        let ready = self.state == ConnectionState::Ready;

        match command {
            MspCommand::FcVariant if handshaking => match payload::parse_variant(&msg.payload) {
                Some(EXPECTED_VARIANT) => {
                    debug!("firmware: {}", EXPECTED_VARIANT);
                    actions.push(query(MspCommand::FcVersion));
                }
                Some(other) => warn!("unsupported firmware {:?}, not following", other),
                None => warn!("short firmware variant reply"),
            },

            MspCommand::FcVersion if handshaking => match FirmwareVersion::parse(&msg.payload) {
                Some(version) => {
                    info!("firmware version {}", version);
                    actions.push(Action::Display(DisplayEvent::FirmwareVersion(
                        version.to_string(),
                    )));
                    actions.push(query(MspCommand::Name));
                }
                None => warn!("short firmware version reply"),
            },

            MspCommand::Name if handshaking => {
                if !msg.payload.is_empty() {
                    info!("craft name: {}", payload::parse_name(&msg.payload));
                }
                actions.push(query(MspCommand::InavMixer));
            }

            MspCommand::InavMixer if handshaking => {
                match payload::parse_platform_type(&msg.payload) {
                    Some(platform) => {
                        info!("platform type: {}", payload::platform_name(platform));
                        if self.config.dont_follow.contains(&platform) {
                            warn!("refusing to follow a {}", payload::platform_name(platform));
                            self.set_state(ConnectionState::Failed);
                        } else {
                            self.set_state(ConnectionState::Ready);
                            self.raw_gps_count = 0;
                        }
                    }
                    None => warn!("short mixer reply"),
                }
            }

            MspCommand::NavStatus if ready => match NavStatus::parse(&msg.payload) {
                Some(status) => {
                    if status.mode != self.vehicle.nav_mode {
                        info!(
                            "nav mode {} -> {}",
                            NavMode::label(self.vehicle.nav_mode),
                            NavMode::label(status.mode)
                        );
                        self.vehicle.nav_mode = status.mode;
                        if status.mode == 0 {
                            actions.push(Action::Display(DisplayEvent::Clear(
                                DisplayRow::VehiclePosition,
                            )));
                        }
                        actions.push(self.mode_display());
                    }
                    actions.push(query(MspCommand::RawGps));
                }
                None => warn!("short nav status reply"),
            },

            MspCommand::RawGps if ready => match RawGps::parse(&msg.payload) {
                Some(gps) => self.update_vehicle(gps, &mut actions),
                None => warn!("short raw gps reply"),
            },

            MspCommand::SetWp => debug!("waypoint acknowledged"),

            command => debug!("ignoring {:?} reply while {}", command, self.state),
        }

        actions
    }

    fn update_vehicle(&mut self, gps: RawGps, actions: &mut Vec<Action>) {
        self.vehicle.position = gps.position;
        self.vehicle.fix_type = gps.fix_type;
        self.vehicle.satellites = gps.satellites;
        self.vehicle.altitude = gps.altitude;
        self.vehicle.speed = gps.speed;
        self.vehicle.course = gps.course;
        self.vehicle.hdop = gps.hdop;

        if self.raw_gps_count % SATS_DISPLAY_DECIMATION == 0 {
            actions.push(Action::Display(DisplayEvent::VehicleSats {
                satellites: gps.satellites,
                hdop: gps.hdop,
            }));
        }

        if self.raw_gps_count % TELEMETRY_LOG_DECIMATION == 0 {
            debug!(
                "vehicle fix: {} sats: {} lat: {:.6} lon: {:.6} alt: {} spd: {:.1} cog: {:.1} hdop: {}",
                gps.fix_type,
                gps.satellites,
                gps.position.latitude,
                gps.position.longitude,
                gps.altitude,
                gps.speed,
                gps.course,
                gps.hdop
            );
        }

        self.raw_gps_count += 1;
    }

    /// Takes a new config snapshot. A vehicle we refused to follow gets
    /// another handshake, since the edit may have been made for it.
    pub fn on_config(&mut self, runtime: RuntimeConfig) {
        self.runtime = runtime;

        if self.state == ConnectionState::Failed {
            info!("config changed, retrying handshake");
            self.reset_connection();
        }
    }

    fn mode_display(&self) -> Action {
        Action::Display(DisplayEvent::Mode {
            connection: self.state,
            nav_mode: self.vehicle.nav_mode,
        })
    }
}

fn query(command: MspCommand) -> Action {
    Action::Send(MspRequest::query(command))
}
