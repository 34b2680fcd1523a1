use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct GpsConfig {
    /// Serial device the handheld GPS receiver is attached to
    pub path: String,

    #[serde(default = "default_baud")]
    pub baud: u32,
}

fn default_baud() -> u32 {
    9600
}
