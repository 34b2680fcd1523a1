use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct MspConfig {
    /// Serial device the flight controller's MSP port is attached to
    pub path: String,

    #[serde(default = "default_baud")]
    pub baud: u32,
}

fn default_baud() -> u32 {
    115200
}
