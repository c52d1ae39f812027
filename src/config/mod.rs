//! Configuration module.

mod loader;
mod timing;
mod types;

pub use loader::*;
pub use timing::*;
pub use types::*;
