//! Control channel to the emulator via the dosdebug companion.

mod command;
mod session;

pub use command::*;
pub use session::*;
