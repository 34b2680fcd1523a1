mod codec;
mod config;
pub mod nmea;
mod task;

pub use codec::*;
pub use config::*;
pub use task::*;
