//! Conversation with the dosdebug companion.
//!
//! dosdebug is the only way to steer a running dosemu, so every control
//! action is a line written to its stdin followed by a best-effort drain of
//! its stdout. Nothing here fails hard: a silent or broken companion is
//! logged and the session carries on, leaving direct termination of the
//! emulator as the last resort.

use std::process::ExitStatus;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::{ChildStdin, ChildStdout};

use crate::config::{CompanionConfig, TimingConfig};
use crate::control::ControlCommand;
use crate::process::{ChildProcess, CommandExchange, PipeReader, SpawnError, SpawnOptions};
use crate::sink::SharedSink;

/// What the companion said while being brought up.
#[derive(Debug, Clone, Default)]
pub struct HandshakeReport {
    /// Banner printed at startup.
    pub banner: Option<CommandExchange>,
    /// Response to `?`, if the command could be sent.
    pub help: Option<CommandExchange>,
}

impl HandshakeReport {
    /// Whether the companion answered `?` with anything at all.
    #[must_use]
    pub fn responsive(&self) -> bool {
        self.help.as_ref().is_some_and(|h| !h.is_empty())
    }
}

/// What happened while asking the companion to shut everything down.
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    /// Response to `kill`, if the command could be sent.
    pub kill: Option<CommandExchange>,
    /// Response to `quit`, if the command could be sent.
    pub quit: Option<CommandExchange>,
    /// Whether the interrupt byte was written.
    pub interrupt_sent: bool,
}

impl ShutdownReport {
    /// Whether `kill` was sent and produced any output.
    ///
    /// A silent `kill` may still have worked; the companion's output is the
    /// only signal available and it is not reliable.
    #[must_use]
    pub fn kill_acknowledged(&self) -> bool {
        self.kill.as_ref().is_some_and(|k| !k.is_empty())
    }
}

/// Session with the companion process.
///
/// Owns the companion's [`ChildProcess`] (when spawned by the session) and
/// its pipes. The pipe types are generic so the protocol can be driven over
/// in-memory streams.
pub struct ControlSession<W = ChildStdin, R = ChildStdout> {
    child: Option<ChildProcess>,
    writer: Option<W>,
    reader: Option<PipeReader<R>>,
    prompt: String,
    timing: TimingConfig,
    sink: SharedSink,
}

impl ControlSession {
    /// Spawn the companion and wrap its pipes.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError::NotExecutable` if the companion path fails the
    /// executable check, or `SpawnError::Launch` if it cannot be started.
    pub fn spawn(
        companion: &CompanionConfig,
        timing: &TimingConfig,
        sink: SharedSink,
    ) -> Result<Self, SpawnError> {
        let child = ChildProcess::spawn(&companion.path, &[], SpawnOptions::piped())?;
        Ok(Self::new(child, companion, timing, sink))
    }

    /// Take over an already spawned companion.
    #[must_use]
    pub fn new(
        mut child: ChildProcess,
        companion: &CompanionConfig,
        timing: &TimingConfig,
        sink: SharedSink,
    ) -> Self {
        let writer = child.take_stdin();
        let reader = child
            .take_stdout()
            .map(|stdout| PipeReader::with_capacity(stdout, companion.buffer_capacity));
        if writer.is_none() || reader.is_none() {
            tracing::warn!(path = %child.path().display(), "Companion spawned without pipes");
        }
        Self {
            child: Some(child),
            writer,
            reader,
            prompt: companion.prompt.clone(),
            timing: timing.clone(),
            sink,
        }
    }
}

impl<W, R> ControlSession<W, R>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    /// Drive the protocol over arbitrary pipes, with no process attached.
    #[must_use]
    pub fn from_pipes(
        writer: W,
        reader: R,
        companion: &CompanionConfig,
        timing: &TimingConfig,
        sink: SharedSink,
    ) -> Self {
        Self {
            child: None,
            writer: Some(writer),
            reader: Some(PipeReader::with_capacity(reader, companion.buffer_capacity)),
            prompt: companion.prompt.clone(),
            timing: timing.clone(),
            sink,
        }
    }

    /// OS process id of the companion, if the session owns one.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(ChildProcess::pid)
    }

    /// Whether commands can still be written.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.writer.is_some()
    }

    /// Whether the session still owns a companion process.
    #[must_use]
    pub fn has_process(&self) -> bool {
        self.child.is_some()
    }

    /// Non-blocking liveness poll of the companion.
    pub fn is_alive(&mut self) -> bool {
        self.child.as_mut().is_some_and(ChildProcess::is_alive)
    }

    /// Read the banner, send `?`, read the answer.
    ///
    /// Never fails: missing output is logged and the session proceeds.
    pub async fn handshake(&mut self) -> HandshakeReport {
        tokio::time::sleep(self.timing.companion_settle()).await;

        let banner = match self.reader.as_mut() {
            Some(reader) => Some(
                reader
                    .read_exchange(None, &self.prompt, self.timing.banner_timeout())
                    .await,
            ),
            None => None,
        };
        if let Some(banner) = banner.as_ref().filter(|b| !b.is_empty()) {
            self.sink
                .info(&format!("Initial dosdebug output:\n{}", banner.response));
        }

        self.sink.info("Verifying dosdebug connection...");
        let help = if self.send(ControlCommand::Help).await {
            self.drain_until_prompt(ControlCommand::Help).await
        } else {
            None
        };
        match help.as_ref() {
            Some(h) if !h.is_empty() => {
                self.sink.info(&format!("From dosdebug:\n{}", h.response));
                if !h.prompt_seen() {
                    tracing::info!(end = ?h.end, "dosdebug prompt not seen after ?");
                }
            }
            _ => tracing::info!("No response from dosdebug to ?"),
        }

        HandshakeReport { banner, help }
    }

    /// Ask the companion to kill the emulator and then exit itself.
    ///
    /// Sends `kill`, reads a line, waits the kill settle interval, sends
    /// `quit`, reads a line, then writes the interrupt byte.
    pub async fn send_shutdown(&mut self) -> ShutdownReport {
        self.sink.info("Sending kill command to terminate DOSEmu");
        let kill = if self.send(ControlCommand::Kill).await {
            self.drain_line(ControlCommand::Kill).await
        } else {
            None
        };
        self.log_response(kill.as_ref());

        tokio::time::sleep(self.timing.kill_settle()).await;

        self.sink.info("Sending quit command to exit debug session");
        let quit = if self.send(ControlCommand::Quit).await {
            self.drain_line(ControlCommand::Quit).await
        } else {
            None
        };
        self.log_response(quit.as_ref());

        let interrupt_sent = self.send(ControlCommand::Interrupt).await;

        let report = ShutdownReport {
            kill,
            quit,
            interrupt_sent,
        };
        if !report.kill_acknowledged() {
            // Stop still succeeds if the emulator is later terminated
            // directly; record that the indirect path gave no sign of life.
            tracing::warn!("dosdebug gave no response to kill");
        }
        report
    }

    /// Cleanup used when the emulator died on its own: send `quit` if the
    /// pipe is still open, then terminate and destroy the companion.
    pub async fn quit_and_terminate(&mut self) -> Option<ExitStatus> {
        if self.is_writable() {
            self.send(ControlCommand::Quit).await;
        }
        if let Some(child) = self.child.as_mut() {
            child.terminate();
        }
        self.release_pipes();
        match self.child.take() {
            Some(child) => child.destroy().await,
            None => None,
        }
    }

    /// Close the session: give the companion the join timeout to exit,
    /// force-terminate it if it is still around, and destroy the handle.
    ///
    /// Calling this when no companion is owned only drops the pipes.
    pub async fn close(&mut self) -> Option<ExitStatus> {
        self.release_pipes();
        let mut child = self.child.take()?;

        if child
            .wait_for_exit(self.timing.companion_join_timeout())
            .await
            .is_none()
            && child.is_alive()
        {
            tracing::debug!(pid = ?child.pid(), "dosdebug still running after join timeout, terminating");
            child.terminate();
        }

        child.destroy().await
    }

    /// Write one command. Returns whether the write went through.
    async fn send(&mut self, command: ControlCommand) -> bool {
        if self.child.as_mut().is_some_and(|c| !c.is_alive()) {
            self.writer = None;
        }
        let Some(writer) = self.writer.as_mut() else {
            tracing::debug!(%command, "dosdebug stdin closed, not sending");
            return false;
        };

        let bytes = command.wire_bytes();
        let write = async {
            writer.write_all(bytes).await?;
            writer.flush().await
        };
        let result = match tokio::time::timeout(self.timing.response_timeout(), write).await {
            Ok(result) => result,
            Err(_) => Err(std::io::Error::from(std::io::ErrorKind::TimedOut)),
        };

        match result {
            Ok(()) => {
                tracing::debug!(%command, "Sent command to dosdebug");
                if command.expects_response() {
                    self.sink.info(&format!("Sent to dosdebug: {command}"));
                }
                true
            }
            Err(e) => {
                if command.expects_response() {
                    self.sink
                        .warn(&format!("Failed to send {command} to dosdebug: {e}"));
                } else {
                    tracing::debug!(%command, error = %e, "Failed to send command to dosdebug");
                }
                self.writer = None;
                false
            }
        }
    }

    async fn drain_until_prompt(&mut self, command: ControlCommand) -> Option<CommandExchange> {
        let label = command.to_string();
        let reader = self.reader.as_mut()?;
        Some(
            reader
                .read_exchange(Some(&label), &self.prompt, self.timing.help_timeout())
                .await,
        )
    }

    async fn drain_line(&mut self, command: ControlCommand) -> Option<CommandExchange> {
        let label = command.to_string();
        let reader = self.reader.as_mut()?;
        Some(
            reader
                .read_line(Some(&label), self.timing.response_timeout())
                .await,
        )
    }

    fn log_response(&self, exchange: Option<&CommandExchange>) {
        if let Some(exchange) = exchange.filter(|e| !e.is_empty()) {
            self.sink
                .info(&format!("From dosdebug:\n{}", exchange.response));
        }
    }

    fn release_pipes(&mut self) {
        self.writer = None;
        self.reader = None;
    }
}
