//! Settle intervals and drain deadlines.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Every wait the supervisor performs, in milliseconds.
///
/// The defaults approximate how long dosemu and dosdebug take to come up
/// and go down on a typical machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Time the emulator gets before its liveness is probed.
    #[serde(default = "default_primary_settle_ms")]
    pub primary_settle_ms: u64,

    /// Time the companion gets before its banner is read.
    #[serde(default = "default_companion_settle_ms")]
    pub companion_settle_ms: u64,

    /// Deadline for reading the companion's banner.
    #[serde(default = "default_banner_timeout_ms")]
    pub banner_timeout_ms: u64,

    /// Deadline for reading the response to `?`.
    #[serde(default = "default_help_timeout_ms")]
    pub help_timeout_ms: u64,

    /// Deadline for the single line read after `kill` and `quit`.
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    /// Pause between `kill` and `quit`.
    #[serde(default = "default_kill_settle_ms")]
    pub kill_settle_ms: u64,

    /// How long `stop` waits for the emulator to exit after `kill`.
    #[serde(default = "default_primary_exit_timeout_ms")]
    pub primary_exit_timeout_ms: u64,

    /// How long the companion gets to exit on its own before it is killed.
    #[serde(default = "default_companion_join_timeout_ms")]
    pub companion_join_timeout_ms: u64,

    /// Liveness poll period used by the `run` front end.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_primary_settle_ms() -> u64 {
    500
}

fn default_companion_settle_ms() -> u64 {
    100
}

fn default_banner_timeout_ms() -> u64 {
    250
}

fn default_help_timeout_ms() -> u64 {
    1000
}

fn default_response_timeout_ms() -> u64 {
    1000
}

fn default_kill_settle_ms() -> u64 {
    500
}

fn default_primary_exit_timeout_ms() -> u64 {
    500
}

fn default_companion_join_timeout_ms() -> u64 {
    1000
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            primary_settle_ms: default_primary_settle_ms(),
            companion_settle_ms: default_companion_settle_ms(),
            banner_timeout_ms: default_banner_timeout_ms(),
            help_timeout_ms: default_help_timeout_ms(),
            response_timeout_ms: default_response_timeout_ms(),
            kill_settle_ms: default_kill_settle_ms(),
            primary_exit_timeout_ms: default_primary_exit_timeout_ms(),
            companion_join_timeout_ms: default_companion_join_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl TimingConfig {
    #[must_use]
    pub fn primary_settle(&self) -> Duration {
        Duration::from_millis(self.primary_settle_ms)
    }

    #[must_use]
    pub fn companion_settle(&self) -> Duration {
        Duration::from_millis(self.companion_settle_ms)
    }

    #[must_use]
    pub fn banner_timeout(&self) -> Duration {
        Duration::from_millis(self.banner_timeout_ms)
    }

    #[must_use]
    pub fn help_timeout(&self) -> Duration {
        Duration::from_millis(self.help_timeout_ms)
    }

    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    #[must_use]
    pub fn kill_settle(&self) -> Duration {
        Duration::from_millis(self.kill_settle_ms)
    }

    #[must_use]
    pub fn primary_exit_timeout(&self) -> Duration {
        Duration::from_millis(self.primary_exit_timeout_ms)
    }

    #[must_use]
    pub fn companion_join_timeout(&self) -> Duration {
        Duration::from_millis(self.companion_join_timeout_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
