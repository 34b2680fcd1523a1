mod config;
mod display;
mod follower;
mod state;
mod task;

pub use config::*;
pub use display::*;
pub use follower::*;
pub use state::*;
pub use task::*;
