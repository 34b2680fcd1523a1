use std::{error::Error, fmt};

use serde::{Deserialize, Serialize};

/// Serial rates accepted for both the GPS and the MSP link.
pub const BAUD_RATES: [u32; 8] = [1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200];

pub const MIN_SATS_RANGE: (u8, u8) = (3, 99);

/// Battery voltage calibration offset, in millivolts.
pub const VBAT_OFFSET_RANGE_MV: (i32, i32) = (0, 1800);

/// The settings that can be changed while the tracker is running. A new
/// snapshot is published every time an edit is accepted; nothing mutates a
/// snapshot in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub gps_baud: u32,
    pub msp_baud: u32,

    /// Minimum number of satellites the handheld GPS must see before the
    /// vehicle is asked to follow it
    pub min_sats: u8,

    /// Battery voltage calibration offset in volts
    pub vbat_offset: f32,

    /// Also move the vehicle's home position to the follow position
    pub reset_home: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            gps_baud: 9600,
            msp_baud: 115200,
            min_sats: 6,
            vbat_offset: 0.8,
            reset_home: false,
        }
    }
}

impl RuntimeConfig {
    /// Returns the snapshot that results from applying `edit` to this one.
    pub fn apply(&self, edit: ConfigEdit) -> RuntimeConfig {
        let mut next = *self;

        match edit {
            ConfigEdit::GpsBaud(baud) => next.gps_baud = baud,
            ConfigEdit::MspBaud(baud) => next.msp_baud = baud,
            ConfigEdit::VbatOffset(offset) => next.vbat_offset = offset,
            ConfigEdit::ResetHome(reset_home) => next.reset_home = reset_home,
            ConfigEdit::MinSats(min_sats) => next.min_sats = min_sats,
        }

        next
    }

    /// Checks a snapshot that did not come from a validated edit, e.g. one
    /// assembled from the config file.
    pub fn validate(&self) -> Result<(), EditError> {
        ConfigKey::GpsBaud.parse_value(&self.gps_baud.to_string())?;
        ConfigKey::MspBaud.parse_value(&self.msp_baud.to_string())?;
        ConfigKey::MinSats.parse_value(&self.min_sats.to_string())?;
        ConfigKey::VbatOffset.parse_value(&self.vbat_offset.to_string())?;
        Ok(())
    }

    /// Renders the current value of `key` the way the console shows it.
    pub fn value_of(&self, key: ConfigKey) -> String {
        match key {
            ConfigKey::GpsBaud => self.gps_baud.to_string(),
            ConfigKey::MspBaud => self.msp_baud.to_string(),
            ConfigKey::VbatOffset => self.vbat_offset.to_string(),
            ConfigKey::ResetHome => self.reset_home.to_string(),
            ConfigKey::MinSats => self.min_sats.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    GpsBaud,
    MspBaud,
    VbatOffset,
    ResetHome,
    MinSats,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 5] = [
        ConfigKey::GpsBaud,
        ConfigKey::MspBaud,
        ConfigKey::VbatOffset,
        ConfigKey::ResetHome,
        ConfigKey::MinSats,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::GpsBaud => "gps_baud",
            ConfigKey::MspBaud => "msp_baud",
            ConfigKey::VbatOffset => "vbat_offset",
            ConfigKey::ResetHome => "reset_home",
            ConfigKey::MinSats => "minsats",
        }
    }

    /// Lower and upper bound, as shown to the user.
    pub fn range(self) -> (&'static str, &'static str) {
        match self {
            ConfigKey::GpsBaud | ConfigKey::MspBaud => ("1200", "115200"),
            ConfigKey::VbatOffset => ("0.0", "1.8"),
            ConfigKey::ResetHome => ("0/false", "1/true"),
            ConfigKey::MinSats => ("3", "99"),
        }
    }

    pub fn from_name(name: &str) -> Option<ConfigKey> {
        ConfigKey::ALL.into_iter().find(|key| key.name() == name)
    }

    /// Parses and range-checks a value for this key.
    pub fn parse_value(self, value: &str) -> Result<ConfigEdit, EditError> {
        let value = value.trim();

        if value.is_empty() {
            return Err(EditError::MissingValue { key: self });
        }

        let invalid = || EditError::InvalidValue {
            key: self,
            value: value.to_owned(),
        };

        match self {
            ConfigKey::GpsBaud | ConfigKey::MspBaud => {
                let baud: u32 = value.parse().map_err(|_| invalid())?;

                if !BAUD_RATES.contains(&baud) {
                    return Err(EditError::OutOfRange {
                        key: self,
                        value: value.to_owned(),
                    });
                }

                Ok(match self {
                    ConfigKey::GpsBaud => ConfigEdit::GpsBaud(baud),
                    _ => ConfigEdit::MspBaud(baud),
                })
            }
            ConfigKey::VbatOffset => {
                let volts: f32 = value.parse().map_err(|_| invalid())?;
                if !volts.is_finite() {
                    return Err(invalid());
                }

                let millivolts = (volts * 1000.0) as i32;
                let (min, max) = VBAT_OFFSET_RANGE_MV;
                if millivolts < min || millivolts > max {
                    return Err(EditError::OutOfRange {
                        key: self,
                        value: value.to_owned(),
                    });
                }

                Ok(ConfigEdit::VbatOffset(millivolts as f32 / 1000.0))
            }
            ConfigKey::ResetHome => Ok(ConfigEdit::ResetHome(matches!(
                value.as_bytes()[0],
                b'1' | b't' | b'T' | b'y' | b'Y'
            ))),
            ConfigKey::MinSats => {
                let sats: i64 = value.parse().map_err(|_| invalid())?;
                let (min, max) = MIN_SATS_RANGE;

                if sats < i64::from(min) || sats > i64::from(max) {
                    return Err(EditError::OutOfRange {
                        key: self,
                        value: value.to_owned(),
                    });
                }

                Ok(ConfigEdit::MinSats(sats as u8))
            }
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single validated change to the runtime config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigEdit {
    GpsBaud(u32),
    MspBaud(u32),
    VbatOffset(f32),
    ResetHome(bool),
    MinSats(u8),
}

impl ConfigEdit {
    pub fn key(&self) -> ConfigKey {
        match self {
            ConfigEdit::GpsBaud(_) => ConfigKey::GpsBaud,
            ConfigEdit::MspBaud(_) => ConfigKey::MspBaud,
            ConfigEdit::VbatOffset(_) => ConfigKey::VbatOffset,
            ConfigEdit::ResetHome(_) => ConfigKey::ResetHome,
            ConfigEdit::MinSats(_) => ConfigKey::MinSats,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditError {
    UnknownKey(String),
    MissingValue { key: ConfigKey },
    InvalidValue { key: ConfigKey, value: String },
    OutOfRange { key: ConfigKey, value: String },
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditError::UnknownKey(key) => write!(f, "unrecognised \"{key}\""),
            EditError::MissingValue { key } => write!(f, "{key} needs a value"),
            EditError::InvalidValue { key, value } => {
                write!(f, "\"{value}\" is not a valid value for {key}")
            }
            EditError::OutOfRange { key, value } => {
                let (min, max) = key.range();
                match key {
                    ConfigKey::GpsBaud | ConfigKey::MspBaud => write!(
                        f,
                        "invalid baud rate {value} for {key} (one of {BAUD_RATES:?})"
                    ),
                    _ => write!(f, "invalid {key} {value} [{min} - {max}]"),
                }
            }
        }
    }
}

impl Error for EditError {}
