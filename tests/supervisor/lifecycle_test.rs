//! End-to-end lifecycle tests with fake dosemu and dosdebug scripts.

use std::sync::Arc;
use std::time::Duration;

use dosemu_supervisor::supervisor::{SupervisorError, SupervisorState};
use tokio::sync::Mutex;

use crate::common::{eventually, kill_pid, pid_alive, Fixture};

#[tokio::test]
async fn start_and_stop_through_dosdebug() {
    let fx = Fixture::new();
    let (mut sup, sink) = fx.supervisor(&fx.companion);

    sup.start(&fx.primary, "").await.unwrap();
    assert_eq!(sup.state(), SupervisorState::Running);
    assert!(sup.is_running().await);
    assert!(sup.last_handshake().unwrap().responsive());

    let pid = sup.primary_pid().unwrap();
    assert_eq!(fx.primary_pid(), Some(pid));
    assert!(sup.companion_pid().is_some());

    let report = sup.stop().await.unwrap();
    assert!(!report.forced_termination);
    assert!(report.shutdown.kill_acknowledged());
    assert!(report.primary_status.is_some());

    assert!(!pid_alive(pid));
    assert_eq!(sup.state(), SupervisorState::Idle);
    assert!(!sup.is_running().await);
    assert!(sup.primary_pid().is_none());
    assert!(sup.companion_pid().is_none());

    let stats = sup.stats();
    assert_eq!(stats.starts, 1);
    assert_eq!(stats.stops, 1);
    assert_eq!(stats.unexpected_exits, 0);

    for expected in [
        "Started DOSEmu",
        "Using dosdebug at:",
        "Started dosdebug",
        "Sending kill command to terminate DOSEmu",
        "Sending quit command to exit debug session",
        "DOSEmu terminated",
    ] {
        assert!(sink.contains(expected), "missing log line: {expected}");
    }
    assert!(!sink.contains("terminating directly"));
}

#[tokio::test]
async fn stop_terminates_directly_when_kill_is_ignored() {
    let fx = Fixture::new();
    let (mut sup, sink) = fx.supervisor(&fx.stubborn_companion);

    sup.start(&fx.primary, "").await.unwrap();
    let pid = sup.primary_pid().unwrap();

    let report = sup.stop().await.unwrap();
    assert!(report.forced_termination);
    assert!(!pid_alive(pid));
    assert!(sink.contains("DOSEmu didn't terminate via dosdebug, terminating directly"));
    assert_eq!(sup.state(), SupervisorState::Idle);
}

#[tokio::test]
async fn stop_succeeds_with_silent_companion() {
    let fx = Fixture::new();
    let (mut sup, _sink) = fx.supervisor(&fx.silent_companion);

    sup.start(&fx.primary, "").await.unwrap();
    assert!(!sup.last_handshake().unwrap().responsive());
    let primary = sup.primary_pid().unwrap();
    let companion = sup.companion_pid().unwrap();

    let report = sup.stop().await.unwrap();
    assert!(!report.shutdown.kill_acknowledged());
    assert!(report.forced_termination);
    assert!(!pid_alive(primary));
    assert!(!pid_alive(companion));
}

#[tokio::test]
async fn primary_dying_during_init_fails_start() {
    let fx = Fixture::new();
    let (mut sup, sink) = fx.supervisor(&fx.companion);

    let err = sup.start(&fx.short_lived, "").await.unwrap_err();
    assert!(matches!(err, SupervisorError::PrimaryDiedDuringInit { .. }));
    assert!(sink.contains("DOSEmu terminated unexpectedly during initialization"));
    assert!(!sink.contains("Starting dosdebug"));
    assert_eq!(sup.state(), SupervisorState::Idle);
    assert_eq!(sup.stats().failed_starts, 1);
}

#[tokio::test]
async fn non_executable_primary_is_rejected() {
    let fx = Fixture::new();
    let (mut sup, sink) = fx.supervisor(&fx.companion);

    let err = sup.start(&fx.not_executable, "").await.unwrap_err();
    assert!(matches!(err, SupervisorError::NotExecutable { .. }));
    assert!(!sink.contains("Started DOSEmu"));
    assert_eq!(sup.state(), SupervisorState::Idle);
}

#[tokio::test]
async fn missing_companion_kills_primary() {
    let fx = Fixture::new();
    let missing = fx.path().join("no-such-dosdebug");
    let (mut sup, _sink) = fx.supervisor(&missing);

    let err = sup.start(&fx.primary, "").await.unwrap_err();
    assert!(matches!(err, SupervisorError::CompanionNotExecutable { .. }));
    assert_eq!(sup.state(), SupervisorState::Idle);

    let pid = fx.primary_pid().unwrap();
    assert!(!pid_alive(pid));
}

#[tokio::test]
async fn companion_launch_failure_kills_primary() {
    let fx = Fixture::new();
    // A directory passes the access check but cannot be exec'd.
    let (mut sup, sink) = fx.supervisor(fx.path());

    let err = sup.start(&fx.primary, "").await.unwrap_err();
    assert!(matches!(err, SupervisorError::CompanionSpawnFailed { .. }));
    assert!(sink.contains("Starting dosdebug"));
    assert!(!sink.contains("Started dosdebug"));

    let pid = fx.primary_pid().unwrap();
    assert!(!pid_alive(pid));
}

#[tokio::test]
async fn second_start_is_rejected_without_touching_session() {
    let fx = Fixture::new();
    let (mut sup, sink) = fx.supervisor(&fx.companion);

    sup.start(&fx.primary, "").await.unwrap();
    let pid = sup.primary_pid().unwrap();

    let err = sup.start(&fx.primary, "").await.unwrap_err();
    assert!(matches!(err, SupervisorError::AlreadyRunning));
    assert!(sink.contains("DOSEmu is already running"));
    assert_eq!(sup.primary_pid(), Some(pid));
    assert!(pid_alive(pid));
    assert_eq!(sup.state(), SupervisorState::Running);

    sup.stop().await.unwrap();
}

#[tokio::test]
async fn primary_exit_cascades_to_companion() {
    let fx = Fixture::new();
    let (mut sup, sink) = fx.supervisor(&fx.companion);

    sup.start(&fx.primary, "").await.unwrap();
    let companion = sup.companion_pid().unwrap();
    kill_pid(sup.primary_pid().unwrap());

    // Shared the way a front end polling from another task would hold it.
    let shared = Arc::new(Mutex::new(sup));
    let noticed = eventually(Duration::from_secs(2), || {
        let shared = Arc::clone(&shared);
        async move { !shared.lock().await.is_running().await }
    })
    .await;
    assert!(noticed, "exit not noticed");

    let mut sup = shared.lock().await;
    assert_eq!(sup.state(), SupervisorState::Idle);
    assert!(!pid_alive(companion));
    assert_eq!(sink.count("DOSEmu has terminated, closing dosdebug"), 1);

    // Later polls are quiet.
    assert!(!sup.is_running().await);
    assert_eq!(sink.count("DOSEmu has terminated, closing dosdebug"), 1);

    let err = sup.stop().await.unwrap_err();
    assert!(matches!(err, SupervisorError::NotRunning));
    assert_eq!(sup.stats().unexpected_exits, 1);
}

#[tokio::test]
async fn config_path_is_passed_with_f_flag() {
    let fx = Fixture::new();
    let (mut sup, sink) = fx.supervisor(&fx.companion);

    sup.start(&fx.primary, "/tmp/custom.cfg").await.unwrap();
    assert_eq!(fx.primary_args().as_deref(), Some("-f /tmp/custom.cfg"));
    assert!(sink.contains(&format!(
        "Executing: {} -f /tmp/custom.cfg",
        fx.primary.display()
    )));
    sup.stop().await.unwrap();

    sup.start(&fx.primary, "~/.dosemurc").await.unwrap();
    assert_eq!(fx.primary_args().as_deref(), Some(""));
    assert!(sink.contains("(with default config)"));
    sup.stop().await.unwrap();
}

#[tokio::test]
async fn extra_args_follow_config_path() {
    let fx = Fixture::new();
    let mut config = fx.config(&fx.companion);
    config.primary.extra_args = vec!["-c".into(), "-V".into()];
    let mut sup = dosemu_supervisor::supervisor::Supervisor::new(
        config,
        Arc::new(dosemu_supervisor::sink::MemorySink::new()),
    );

    sup.start(&fx.primary, "dos.cfg").await.unwrap();
    assert_eq!(fx.primary_args().as_deref(), Some("-f dos.cfg -c -V"));
    sup.stop().await.unwrap();
}

#[tokio::test]
async fn supervisor_can_restart_after_stop() {
    let fx = Fixture::new();
    let (mut sup, _sink) = fx.supervisor(&fx.companion);

    sup.start(&fx.primary, "").await.unwrap();
    let first = sup.primary_pid().unwrap();
    sup.stop().await.unwrap();

    sup.start(&fx.primary, "").await.unwrap();
    let second = sup.primary_pid().unwrap();
    assert_ne!(first, second);
    sup.stop().await.unwrap();

    let stats = sup.stats();
    assert_eq!(stats.starts, 2);
    assert_eq!(stats.stops, 2);
}

#[tokio::test]
async fn abandoned_start_leaves_supervisor_unusable() {
    let fx = Fixture::new();
    let (mut sup, _sink) = fx.supervisor(&fx.companion);

    // Cancel while waiting for the emulator to settle.
    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), sup.start(&fx.primary, "")).await;
    assert!(abandoned.is_err());
    assert_eq!(sup.state(), SupervisorState::Starting);

    let err = sup.start(&fx.primary, "").await.unwrap_err();
    assert!(matches!(
        err,
        SupervisorError::InvalidState {
            operation: "start",
            state: SupervisorState::Starting
        }
    ));
    let err = sup.stop().await.unwrap_err();
    assert!(matches!(err, SupervisorError::InvalidState { operation: "stop", .. }));
}
