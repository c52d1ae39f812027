//! Child process spawning and pipe draining.
//!
//! Everything platform-specific about the emulator and its companion lives
//! here, so the control session and supervisor only deal in
//! spawn/poll/terminate/destroy.

mod child;
mod pipe;

pub use child::*;
pub use pipe::*;
