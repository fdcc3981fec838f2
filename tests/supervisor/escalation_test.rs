//! Deadline handling and the graceful-then-forceful escalation ladder.

use std::time::Duration;
use std::time::Instant;

use procpump::process::LaunchConfig;
use procpump::supervisor::ProcessSupervisor;

use super::{ctx, Probe};

#[cfg(unix)]
#[tokio::test]
async fn total_deadline_terminates_a_silent_process() {
    let config = LaunchConfig::new(["sleep", "30"]).total_timeout(Duration::from_secs(1));
    let mut supervisor = ProcessSupervisor::spawn(&config, &ctx()).unwrap();
    let mut probe = Probe::default();

    let start = Instant::now();
    let code = supervisor.run(&mut probe).await.unwrap();

    // Bounded by total_deadline + two shutdown windows, with slop.
    assert!(start.elapsed() < Duration::from_secs(6));
    assert_eq!(code, -15);
    assert_eq!(probe.timeouts, 1);
    assert_eq!(probe.terminate_calls, vec![-15]);
}

#[cfg(unix)]
#[tokio::test]
async fn graceful_ignorer_is_killed_automatically() {
    // The child shields itself from SIGTERM; the supervisor must escalate.
    let config = LaunchConfig::new(["sh", "-c", r#"trap '' TERM; sleep 30 & wait"#])
        .total_timeout(Duration::from_secs(1));
    let mut supervisor = ProcessSupervisor::spawn(&config, &ctx()).unwrap();
    let mut probe = Probe::default();

    let start = Instant::now();
    let code = supervisor.run(&mut probe).await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(8));
    assert_eq!(code, -9);
    assert_eq!(probe.timeouts, 1);
    assert_eq!(probe.terminate_calls, vec![-9]);
}

#[cfg(unix)]
#[tokio::test]
async fn idle_timeout_fires_but_is_not_fatal() {
    // One line, then silence far longer than the idle window; the process
    // still exits on its own and the run succeeds.
    let config = LaunchConfig::new(["sh", "-c", r#"printf 'x\n'; sleep 1"#])
        .idle_timeout(Duration::from_millis(200))
        .total_timeout(Duration::from_secs(10));
    let mut supervisor = ProcessSupervisor::spawn(&config, &ctx()).unwrap();
    let mut probe = Probe::default();

    let code = supervisor.run(&mut probe).await.unwrap();

    assert_eq!(code, 0);
    assert_eq!(probe.timeouts, 1);
    assert_eq!(probe.stdout, vec!["x\n"]);
}

#[cfg(unix)]
#[tokio::test]
async fn handler_can_make_idle_silence_fatal() {
    let config =
        LaunchConfig::new(["sleep", "30"]).idle_timeout(Duration::from_millis(300));
    let mut supervisor = ProcessSupervisor::spawn(&config, &ctx()).unwrap();
    let mut probe = Probe {
        terminate_on_timeout: Some(supervisor.control()),
        ..Probe::default()
    };

    let start = Instant::now();
    let code = supervisor.run(&mut probe).await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(6));
    assert_eq!(code, -15);
    assert_eq!(probe.timeouts, 1);
}

#[cfg(unix)]
#[tokio::test]
async fn steady_output_never_trips_the_idle_deadline() {
    let script = r#"i=0; while [ $i -lt 5 ]; do printf 'tick\n'; sleep 0.1; i=$((i+1)); done"#;
    let config = LaunchConfig::new(["sh", "-c", script])
        .idle_timeout(Duration::from_secs(1))
        .total_timeout(Duration::from_secs(10));
    let mut supervisor = ProcessSupervisor::spawn(&config, &ctx()).unwrap();
    let mut probe = Probe::default();

    let code = supervisor.run(&mut probe).await.unwrap();

    assert_eq!(code, 0);
    assert_eq!(probe.timeouts, 0);
    assert_eq!(probe.stdout.len(), 5);
}

#[cfg(unix)]
#[tokio::test]
async fn orphaned_pipe_holder_does_not_block_forever() {
    // The child exits but hands its pipes to a long-lived grandchild, so the
    // streams never reach EOF. The forceful window bounds the wait anyway.
    let config = LaunchConfig::new(["sh", "-c", r#"sleep 30 & printf 'parent\n'"#])
        .total_timeout(Duration::from_secs(1));
    let mut supervisor = ProcessSupervisor::spawn(&config, &ctx()).unwrap();
    let mut probe = Probe::default();

    let start = Instant::now();
    let code = supervisor.run(&mut probe).await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(8));
    assert_eq!(probe.stdout, vec!["parent\n"]);
    // The sh itself exited cleanly; the supervisor reports that status.
    // The detached sleep expires on its own.
    assert_eq!(code, 0);
}
