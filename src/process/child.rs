//! OS child process handle.
//!
//! A [`ChildProcess`] owns exactly one spawned process. It is destroyed by
//! value, so a handle can never be polled or signalled after its resources
//! have been released; a new run always spawns a new handle.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// Upper bound on how long [`ChildProcess::destroy`] waits to reap.
pub const DESTROY_REAP_TIMEOUT: Duration = Duration::from_secs(2);

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The path failed the executable-permission check.
    #[error("Cannot execute {}: {source}", .path.display())]
    NotExecutable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The OS launch call failed.
    #[error("Failed to launch {}: {source}", .path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SpawnError {
    /// Path of the executable that could not be spawned.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotExecutable { path, .. } | Self::Launch { path, .. } => path,
        }
    }
}

/// Check that `path` may be executed by the current user.
///
/// On Unix this is `access(path, X_OK)`, the same check `execve` applies
/// before loading the image. Elsewhere any existing file passes.
///
/// # Errors
///
/// Returns `SpawnError::NotExecutable` if the check fails.
pub fn check_executable(path: &Path) -> Result<(), SpawnError> {
    #[cfg(unix)]
    {
        use nix::unistd::{access, AccessFlags};

        access(path, AccessFlags::X_OK).map_err(|errno| SpawnError::NotExecutable {
            path: path.to_path_buf(),
            source: std::io::Error::from(errno),
        })
    }

    #[cfg(not(unix))]
    {
        if path.is_file() {
            Ok(())
        } else {
            Err(SpawnError::NotExecutable {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }
    }
}

/// Which standard streams to pipe back to the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnOptions {
    /// Pipe stdin so commands can be written to the child.
    pub pipe_stdin: bool,
    /// Pipe stdout so responses can be drained from the child.
    pub pipe_stdout: bool,
}

impl SpawnOptions {
    /// Both stdin and stdout piped; used for the companion.
    #[must_use]
    pub fn piped() -> Self {
        Self {
            pipe_stdin: true,
            pipe_stdout: true,
        }
    }

    /// No pipes back to the supervisor; used for the primary, which is
    /// never spoken to directly.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            pipe_stdin: false,
            pipe_stdout: false,
        }
    }
}

/// A spawned child process.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
    path: PathBuf,
    args: Vec<String>,
    pid: Option<u32>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    exit_status: Option<ExitStatus>,
}

impl ChildProcess {
    /// Spawn `path` with `args`.
    ///
    /// The child inherits the caller's environment and runs asynchronously.
    /// It is killed if the handle is dropped without being destroyed.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError::NotExecutable` if the executable check fails, or
    /// `SpawnError::Launch` if the OS refuses to start the process.
    pub fn spawn(path: &Path, args: &[String], options: SpawnOptions) -> Result<Self, SpawnError> {
        check_executable(path)?;

        let mut cmd = Command::new(path);
        cmd.args(args)
            .stdin(if options.pipe_stdin {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(if options.pipe_stdout {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stderr(Stdio::null())
            .kill_on_drop(true);

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let mut child = cmd.spawn().map_err(|source| SpawnError::Launch {
            path: path.to_path_buf(),
            source,
        })?;

        let pid = child.id();
        tracing::debug!(path = %path.display(), ?args, ?pid, "Spawned child process");

        Ok(Self {
            stdin: child.stdin.take(),
            stdout: child.stdout.take(),
            child,
            path: path.to_path_buf(),
            args: args.to_vec(),
            pid,
            exit_status: None,
        })
    }

    /// Executable this process was spawned from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Arguments passed at spawn time.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// OS process id recorded at spawn time.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Exit status, once the process has been observed to exit.
    #[must_use]
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Take ownership of the stdin handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.stdin.take()
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// Non-blocking liveness poll.
    pub fn is_alive(&mut self) -> bool {
        if self.exit_status.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                tracing::debug!(path = %self.path.display(), %status, "Child process exited");
                self.exit_status = Some(status);
                false
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to poll child process");
                false
            }
        }
    }

    /// Request forceful termination without waiting for the exit.
    pub fn terminate(&mut self) {
        if self.exit_status.is_some() {
            return;
        }
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(path = %self.path.display(), error = %e, "Kill request failed");
        }
    }

    /// Wait up to `timeout` for the process to exit.
    ///
    /// Returns the exit status if it exited in time.
    pub async fn wait_for_exit(&mut self, timeout: Duration) -> Option<ExitStatus> {
        if let Some(status) = self.exit_status {
            return Some(status);
        }
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                self.exit_status = Some(status);
                Some(status)
            }
            Ok(Err(e)) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to wait on child process");
                None
            }
            Err(_) => None,
        }
    }

    /// Release the process: close any pipes still held and reap it.
    ///
    /// Call after the process has exited or been terminated. If it has not
    /// exited within [`DESTROY_REAP_TIMEOUT`] it is killed first.
    pub async fn destroy(mut self) -> Option<ExitStatus> {
        drop(self.stdin.take());
        drop(self.stdout.take());

        if let Some(status) = self.wait_for_exit(DESTROY_REAP_TIMEOUT).await {
            return Some(status);
        }

        tracing::warn!(path = %self.path.display(), pid = ?self.pid, "Process still alive at destroy, killing");
        self.terminate();
        self.wait_for_exit(DESTROY_REAP_TIMEOUT).await
    }
}
