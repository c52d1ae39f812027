//! Shared fixtures: shell scripts standing in for dosemu and dosdebug.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dosemu_supervisor::config::{CompanionConfig, SupervisorConfig, TimingConfig};
use dosemu_supervisor::sink::MemorySink;
use dosemu_supervisor::supervisor::Supervisor;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tempfile::TempDir;

/// Timings short enough for tests but long enough for `/bin/sh` to start.
pub fn fast_timing() -> TimingConfig {
    TimingConfig {
        primary_settle_ms: 200,
        companion_settle_ms: 20,
        banner_timeout_ms: 200,
        help_timeout_ms: 300,
        response_timeout_ms: 300,
        kill_settle_ms: 50,
        primary_exit_timeout_ms: 500,
        companion_join_timeout_ms: 300,
        poll_interval_ms: 50,
    }
}

/// A temp directory with a fake emulator and several fake companions.
pub struct Fixture {
    pub dir: TempDir,
    /// Records its pid and argv, then sleeps.
    pub primary: PathBuf,
    /// Exits immediately.
    pub short_lived: PathBuf,
    /// Not executable.
    pub not_executable: PathBuf,
    /// Speaks the dosdebug protocol and kills the emulator on `kill`.
    pub companion: PathBuf,
    /// Speaks the protocol but ignores `kill`.
    pub stubborn_companion: PathBuf,
    /// Never reads or writes anything.
    pub silent_companion: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let pid_file = root.join("primary.pid");
        let args_file = root.join("primary.args");

        let primary = write_script(
            &root,
            "dosemu",
            &format!(
                "echo $$ > '{}'\necho \"$@\" > '{}'\nexec sleep 30\n",
                pid_file.display(),
                args_file.display()
            ),
        );
        let short_lived = write_script(&root, "dosemu-crash", "exit 0\n");

        let not_executable = root.join("dosemu-noexec");
        std::fs::write(&not_executable, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&not_executable, std::fs::Permissions::from_mode(0o644)).unwrap();

        let companion = write_script(
            &root,
            "dosdebug",
            &companion_body(&format!(
                "kill \"$(cat '{}')\" 2>/dev/null; echo 'dosemu killed'",
                pid_file.display()
            )),
        );
        let stubborn_companion =
            write_script(&root, "dosdebug-stubborn", &companion_body("echo 'kill ignored'"));
        let silent_companion = write_script(&root, "dosdebug-silent", "exec sleep 30\n");

        Self {
            dir,
            primary,
            short_lived,
            not_executable,
            companion,
            stubborn_companion,
            silent_companion,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Settings pointing the supervisor at `companion`.
    pub fn config(&self, companion: &Path) -> SupervisorConfig {
        SupervisorConfig {
            companion: CompanionConfig {
                path: companion.to_path_buf(),
                ..Default::default()
            },
            timing: fast_timing(),
            ..Default::default()
        }
    }

    /// Supervisor wired to `companion`, logging into a memory sink.
    pub fn supervisor(&self, companion: &Path) -> (Supervisor, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (Supervisor::new(self.config(companion), sink.clone()), sink)
    }

    /// Pid written by the fake emulator, if it got that far.
    pub fn primary_pid(&self) -> Option<u32> {
        std::fs::read_to_string(self.path().join("primary.pid"))
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    /// Arguments the fake emulator was started with, space separated.
    pub fn primary_args(&self) -> Option<String> {
        std::fs::read_to_string(self.path().join("primary.args"))
            .ok()
            .map(|s| s.trim_end().to_string())
    }
}

fn companion_body(on_kill: &str) -> String {
    format!(
        r#"echo 'DOSEMU debugger'
printf 'dosdebug> '
while IFS= read -r line; do
  case "$line" in
    "?") printf 'r - registers\nkill - kill dosemu\nquit - exit\ndosdebug> ' ;;
    kill) {on_kill} ;;
    quit) echo 'bye'; exit 0 ;;
    *) printf 'dosdebug> ' ;;
  esac
done
"#
    )
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Whether a process with this pid still exists (reaped processes do not).
pub fn pid_alive(pid: u32) -> bool {
    kill(Pid::from_raw(i32::try_from(pid).unwrap()), None).is_ok()
}

/// SIGKILL a process behind the supervisor's back.
pub fn kill_pid(pid: u32) {
    kill(Pid::from_raw(i32::try_from(pid).unwrap()), Signal::SIGKILL).unwrap();
}

/// Poll `check` until it returns true or `timeout` passes.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}
