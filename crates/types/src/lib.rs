mod config;
mod fix;

pub use config::*;
pub use fix::*;

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coords2D {
    /// Latitude in degrees
    pub latitude: f32,

    /// Longitude in degrees
    pub longitude: f32,
}

impl Coords2D {
    pub fn new(latitude: f32, longitude: f32) -> Self {
        Coords2D {
            latitude,
            longitude,
        }
    }

    /// (0, 0) is what receivers report before they have a position, so it is
    /// treated as "no position" rather than a point in the Gulf of Guinea.
    pub fn is_null(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }
}
