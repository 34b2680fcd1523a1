#[macro_use]
extern crate num_derive;

mod codec;
pub mod command;
mod config;
pub mod crc8;
mod message;
pub mod payload;
mod task;

pub use codec::*;
pub use command::MspCommand;
pub use config::*;
pub use message::*;
pub use task::*;
