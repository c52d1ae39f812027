//! DOSEmu supervisor - launch and control DOSEmu through dosdebug.

pub mod config;
pub mod control;
pub mod display;
pub mod process;
pub mod sink;
pub mod supervisor;
