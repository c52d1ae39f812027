//! Supervisor state machine.

use std::fmt;

/// Lifecycle state of the emulator/companion pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SupervisorState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
}

impl SupervisorState {
    /// Whether moving from `self` to `to` is allowed.
    ///
    /// `Running -> Idle` is the cascading cleanup after the emulator dies
    /// on its own; `Starting -> Idle` is a failed start.
    #[must_use]
    pub fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Idle, Self::Starting)
                | (Self::Starting, Self::Running | Self::Idle)
                | (Self::Running, Self::Stopping | Self::Idle)
                | (Self::Stopping, Self::Idle)
        )
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Starting => f.write_str("starting"),
            Self::Running => f.write_str("running"),
            Self::Stopping => f.write_str("stopping"),
        }
    }
}

/// State machine tracking the supervisor lifecycle.
#[derive(Debug, Clone)]
pub struct SupervisorStateMachine {
    state: SupervisorState,
    starts: usize,
    failed_starts: usize,
    stops: usize,
    unexpected_exits: usize,
}

impl Default for SupervisorStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SupervisorStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SupervisorState::Idle,
            starts: 0,
            failed_starts: 0,
            stops: 0,
            unexpected_exits: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn transition(&mut self, new_state: SupervisorState) {
        debug_assert!(
            self.state.can_transition(new_state),
            "illegal transition {} -> {new_state}",
            self.state
        );
        tracing::debug!(from = ?self.state, to = ?new_state, "State transition");
        match (self.state, new_state) {
            (SupervisorState::Starting, SupervisorState::Running) => {
                self.starts = self.starts.saturating_add(1);
            }
            (SupervisorState::Starting, SupervisorState::Idle) => {
                self.failed_starts = self.failed_starts.saturating_add(1);
            }
            (SupervisorState::Stopping, SupervisorState::Idle) => {
                self.stops = self.stops.saturating_add(1);
            }
            (SupervisorState::Running, SupervisorState::Idle) => {
                self.unexpected_exits = self.unexpected_exits.saturating_add(1);
            }
            _ => {}
        }
        self.state = new_state;
    }

    #[must_use]
    pub fn stats(&self) -> SupervisorStats {
        SupervisorStats {
            starts: self.starts,
            failed_starts: self.failed_starts,
            stops: self.stops,
            unexpected_exits: self.unexpected_exits,
        }
    }
}

/// Lifetime counters for one supervisor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    pub starts: usize,
    pub failed_starts: usize,
    pub stops: usize,
    pub unexpected_exits: usize,
}
