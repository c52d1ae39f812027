//! Supervisor error types.

use std::path::PathBuf;
use std::process::ExitStatus;

use crate::process::SpawnError;
use crate::supervisor::SupervisorState;

/// Errors returned by [`Supervisor`](crate::supervisor::Supervisor)
/// operations. None of them are fatal to the supervisor itself.
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    /// The emulator path failed the executable check.
    #[error("Cannot execute {}: {source}", .path.display())]
    NotExecutable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The OS refused to launch the emulator.
    #[error("Failed to start DOSEmu: {source}")]
    SpawnFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The emulator exited before the settle interval elapsed.
    #[error("DOSEmu terminated unexpectedly during initialization{}", describe_status(.status))]
    PrimaryDiedDuringInit { status: Option<ExitStatus> },

    /// The companion path failed the executable check.
    #[error("Cannot execute {}: {source}", .path.display())]
    CompanionNotExecutable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The OS refused to launch the companion.
    #[error("Failed to start dosdebug: {source}")]
    CompanionSpawnFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// `start` was called while a session is running.
    #[error("DOSEmu is already running")]
    AlreadyRunning,

    /// `stop` was called with no running session.
    #[error("DOSEmu is not running")]
    NotRunning,

    /// The operation is not allowed in the current state.
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: SupervisorState,
    },
}

fn describe_status(status: &Option<ExitStatus>) -> String {
    status.map_or_else(String::new, |s| format!(" ({s})"))
}

impl SupervisorError {
    /// Classify a failure to spawn the emulator.
    #[must_use]
    pub fn from_primary_spawn(err: SpawnError) -> Self {
        match err {
            SpawnError::NotExecutable { path, source } => Self::NotExecutable { path, source },
            SpawnError::Launch { path, source } => Self::SpawnFailed { path, source },
        }
    }

    /// Classify a failure to spawn the companion.
    #[must_use]
    pub fn from_companion_spawn(err: SpawnError) -> Self {
        match err {
            SpawnError::NotExecutable { path, source } => {
                Self::CompanionNotExecutable { path, source }
            }
            SpawnError::Launch { path, source } => Self::CompanionSpawnFailed { path, source },
        }
    }
}
