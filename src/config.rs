use std::path::Path;

use anyhow::Context;
use config::{Config, ConfigError};
use fm_follow::FollowConfig;
use fm_gps::GpsConfig;
use fm_msp::MspConfig;
use fm_types::RuntimeConfig;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct FollowMeConfig {
    pub gps: GpsConfig,
    pub msp: MspConfig,
    #[serde(default)]
    pub follow: FollowConfig,
}

impl FollowMeConfig {
    pub fn read_from_path(path: &Path) -> Result<Self, ConfigError> {
        let mut c = Config::new();

        c.merge(config::File::from(path))?;
        c.merge(config::Environment::with_prefix("FOLLOWME").separator("__"))?;

        c.try_into()
    }

    /// The settings the console can change, seeded from the file.
    pub fn runtime(&self) -> anyhow::Result<RuntimeConfig> {
        let runtime = RuntimeConfig {
            gps_baud: self.gps.baud,
            msp_baud: self.msp.baud,
            min_sats: self.follow.min_sats,
            vbat_offset: self.follow.vbat_offset,
            reset_home: self.follow.reset_home,
        };

        runtime.validate().context("invalid config")?;

        if self.follow.tick_ms == 0 {
            anyhow::bail!("follow.tick_ms must be greater than zero");
        }

        Ok(runtime)
    }
}
