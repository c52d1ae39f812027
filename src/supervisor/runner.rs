//! Supervisor for the dosemu/dosdebug pair.
//!
//! dosemu has no control channel of its own, so it is started first, given
//! time to come up, and then driven through a dosdebug session. Shutdown
//! asks dosdebug to kill it and falls back to killing it directly.

use std::path::Path;
use std::process::ExitStatus;

use crate::config::SupervisorConfig;
use crate::control::{ControlSession, HandshakeReport, ShutdownReport};
use crate::process::{check_executable, ChildProcess, SpawnOptions};
use crate::sink::{SharedSink, TracingSink};
use crate::supervisor::{
    SupervisorError, SupervisorState, SupervisorStateMachine, SupervisorStats,
};

/// Outcome of a successful [`Supervisor::stop`].
#[derive(Debug, Clone, Default)]
pub struct StopReport {
    /// What dosdebug said to `kill` and `quit`.
    pub shutdown: ShutdownReport,
    /// Whether the emulator had to be killed directly.
    pub forced_termination: bool,
    /// Exit status of the emulator, if it was reaped.
    pub primary_status: Option<ExitStatus>,
}

/// Supervisor owning one emulator process and its dosdebug session.
///
/// All operations take `&mut self`, so calls are serialized by ownership;
/// share it behind a `tokio::sync::Mutex` if several tasks need it.
pub struct Supervisor {
    config: SupervisorConfig,
    state: SupervisorStateMachine,
    primary: Option<ChildProcess>,
    control: Option<ControlSession>,
    handshake: Option<HandshakeReport>,
    sink: SharedSink,
}

impl Supervisor {
    /// Create an idle supervisor reporting progress to `sink`.
    #[must_use]
    pub fn new(config: SupervisorConfig, sink: SharedSink) -> Self {
        Self {
            config,
            state: SupervisorStateMachine::new(),
            primary: None,
            control: None,
            handshake: None,
            sink,
        }
    }

    /// Create an idle supervisor that reports progress through `tracing`.
    #[must_use]
    pub fn with_config(config: SupervisorConfig) -> Self {
        Self::new(config, std::sync::Arc::new(TracingSink))
    }

    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.state.state()
    }

    #[must_use]
    pub fn stats(&self) -> SupervisorStats {
        self.state.stats()
    }

    /// Process id of the emulator, while one is owned.
    #[must_use]
    pub fn primary_pid(&self) -> Option<u32> {
        self.primary.as_ref().and_then(ChildProcess::pid)
    }

    /// Process id of dosdebug, while one is owned.
    #[must_use]
    pub fn companion_pid(&self) -> Option<u32> {
        self.control.as_ref().and_then(ControlSession::pid)
    }

    /// What dosdebug said during the last successful start.
    #[must_use]
    pub fn last_handshake(&self) -> Option<&HandshakeReport> {
        self.handshake.as_ref()
    }

    /// Start the emulator at the configured default path.
    ///
    /// # Errors
    ///
    /// See [`Supervisor::start`].
    pub async fn start_default(&mut self, config_path: &str) -> Result<(), SupervisorError> {
        let path = self.config.primary.path.clone();
        self.start(path, config_path).await
    }

    /// Start the emulator, then dosdebug, then handshake with dosdebug.
    ///
    /// An empty `config_path`, or the configured default sentinel, starts
    /// the emulator with its own default config; anything else is passed as
    /// `-f <config_path>`.
    ///
    /// # Errors
    ///
    /// - `AlreadyRunning` if a session is running.
    /// - `InvalidState` if an earlier start or stop was abandoned midway.
    /// - `NotExecutable` / `SpawnFailed` if the emulator cannot be started.
    /// - `PrimaryDiedDuringInit` if it exits within the settle interval.
    /// - `CompanionNotExecutable` / `CompanionSpawnFailed` if dosdebug
    ///   cannot be started; the emulator is killed in that case.
    pub async fn start(
        &mut self,
        primary_path: impl AsRef<Path>,
        config_path: &str,
    ) -> Result<(), SupervisorError> {
        if self.is_running().await {
            return Err(self.fail(SupervisorError::AlreadyRunning));
        }
        if self.state() != SupervisorState::Idle {
            return Err(self.fail(SupervisorError::InvalidState {
                operation: "start",
                state: self.state(),
            }));
        }

        let primary_path = primary_path.as_ref();
        let args = self.config.primary.build_args(config_path);
        if self.config.primary.uses_default_config(config_path) {
            self.sink.info(&format!(
                "Executing: {} (with default config)",
                primary_path.display()
            ));
        } else {
            self.sink.info(&format!(
                "Executing: {} {}",
                primary_path.display(),
                args.join(" ")
            ));
        }

        self.state.transition(SupervisorState::Starting);

        let mut primary = match ChildProcess::spawn(primary_path, &args, SpawnOptions::detached()) {
            Ok(child) => child,
            Err(e) => {
                self.state.transition(SupervisorState::Idle);
                return Err(self.fail(SupervisorError::from_primary_spawn(e)));
            }
        };
        self.sink.info("Started DOSEmu");

        let settle = self.config.timing.primary_settle();
        if let Some(status) = primary.wait_for_exit(settle).await {
            primary.destroy().await;
            self.state.transition(SupervisorState::Idle);
            return Err(self.fail(SupervisorError::PrimaryDiedDuringInit {
                status: Some(status),
            }));
        }
        self.sink.info(&format!(
            "Waited {}ms for DOSEmu initialization",
            settle.as_millis()
        ));

        let companion_path = self.config.companion.path.clone();
        if let Err(e) = check_executable(&companion_path) {
            Self::discard(primary).await;
            self.state.transition(SupervisorState::Idle);
            return Err(self.fail(SupervisorError::from_companion_spawn(e)));
        }
        self.sink
            .info(&format!("Using dosdebug at: {}", companion_path.display()));

        self.sink.info("Starting dosdebug");
        let mut control = match ControlSession::spawn(
            &self.config.companion,
            &self.config.timing,
            self.sink.clone(),
        ) {
            Ok(control) => control,
            Err(e) => {
                Self::discard(primary).await;
                self.state.transition(SupervisorState::Idle);
                return Err(self.fail(SupervisorError::from_companion_spawn(e)));
            }
        };
        self.sink.info("Started dosdebug");

        let handshake = control.handshake().await;
        tracing::debug!(
            responsive = handshake.responsive(),
            primary_pid = ?primary.pid(),
            companion_pid = ?control.pid(),
            "Handshake finished"
        );

        self.primary = Some(primary);
        self.control = Some(control);
        self.handshake = Some(handshake);
        self.state.transition(SupervisorState::Running);
        Ok(())
    }

    /// Stop the emulator through dosdebug, then tear both processes down.
    ///
    /// Succeeds whenever the emulator ends up terminated, whether dosdebug
    /// handled `kill` or the emulator had to be killed directly.
    ///
    /// # Errors
    ///
    /// - `NotRunning` if there is no session, or the emulator already died
    ///   (its cleanup runs as part of the check).
    /// - `InvalidState` if an earlier start or stop was abandoned midway.
    pub async fn stop(&mut self) -> Result<StopReport, SupervisorError> {
        match self.state() {
            SupervisorState::Running => {}
            SupervisorState::Idle => return Err(self.fail(SupervisorError::NotRunning)),
            state @ (SupervisorState::Starting | SupervisorState::Stopping) => {
                return Err(self.fail(SupervisorError::InvalidState {
                    operation: "stop",
                    state,
                }));
            }
        }
        if !self.is_running().await {
            return Err(self.fail(SupervisorError::NotRunning));
        }

        self.state.transition(SupervisorState::Stopping);
        let mut control = self.control.take();
        let mut primary = self.primary.take();

        let shutdown = match control.as_mut() {
            Some(control) => control.send_shutdown().await,
            None => ShutdownReport::default(),
        };

        if let Some(primary) = primary.as_mut() {
            primary
                .wait_for_exit(self.config.timing.primary_exit_timeout())
                .await;
        }

        if let Some(mut control) = control {
            control.close().await;
        }

        let mut forced_termination = false;
        let mut primary_status = None;
        if let Some(mut primary) = primary {
            if primary.is_alive() {
                self.sink
                    .warn("DOSEmu didn't terminate via dosdebug, terminating directly");
                primary.terminate();
                forced_termination = true;
            }
            primary_status = primary.destroy().await;
        }

        self.handshake = None;
        self.state.transition(SupervisorState::Idle);
        self.sink.info("DOSEmu terminated");

        Ok(StopReport {
            shutdown,
            forced_termination,
            primary_status,
        })
    }

    /// Whether the emulator is running.
    ///
    /// If the emulator has died since the last poll, dosdebug is told to
    /// quit and torn down, and the supervisor returns to idle. Later polls
    /// return `false` without doing anything.
    pub async fn is_running(&mut self) -> bool {
        if self.state() != SupervisorState::Running {
            return false;
        }
        if self.primary.as_mut().is_some_and(ChildProcess::is_alive) {
            return true;
        }

        let status = self.primary.as_ref().and_then(ChildProcess::exit_status);
        tracing::info!(?status, "Emulator exited outside of stop");

        if let Some(mut control) = self.control.take() {
            self.sink.info("DOSEmu has terminated, closing dosdebug");
            control.quit_and_terminate().await;
        }
        if let Some(primary) = self.primary.take() {
            primary.destroy().await;
        }

        self.handshake = None;
        self.state.transition(SupervisorState::Idle);
        false
    }

    /// Kill and reap an emulator that can no longer be controlled.
    async fn discard(mut primary: ChildProcess) {
        primary.terminate();
        primary.destroy().await;
    }

    /// Report `err` to the sink and hand it back.
    fn fail(&self, err: SupervisorError) -> SupervisorError {
        self.sink.error(&err.to_string());
        err
    }
}
