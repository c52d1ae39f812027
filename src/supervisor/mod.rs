//! Supervisor module: lifecycle state machine for the emulator and its
//! dosdebug companion.

mod error;
mod runner;
mod state;

pub use error::*;
pub use runner::*;
pub use state::*;
