//! Hexapod controller types shared by the session core and the simulator.

pub mod command;
pub mod fault;
pub mod state;
pub mod status;
pub mod telemetry;

pub use command::*;
pub use fault::*;
pub use state::*;
pub use status::*;
pub use telemetry::*;
