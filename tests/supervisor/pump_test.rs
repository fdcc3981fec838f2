//! Happy-path and output-delivery behavior of the pump loop.

use std::time::Duration;

use procpump::process::{LaunchConfig, LaunchError};
use procpump::supervisor::ProcessSupervisor;

use super::{ctx, Probe};

#[cfg(unix)]
#[tokio::test]
async fn clean_exit_delivers_every_line_once() {
    let config = LaunchConfig::new(["sh", "-c", r#"printf 'a\n'; printf 'b\n' >&2"#])
        .total_timeout(Duration::from_secs(5));
    let mut supervisor = ProcessSupervisor::spawn(&config, &ctx()).unwrap();
    let mut probe = Probe::default();

    let code = supervisor.run(&mut probe).await.unwrap();

    assert_eq!(code, 0);
    assert_eq!(probe.stdout, vec!["a\n"]);
    assert_eq!(probe.stderr, vec!["b\n"]);
    assert_eq!(probe.timeouts, 0);
    assert_eq!(probe.terminate_calls, vec![0]);
}

#[cfg(unix)]
#[tokio::test]
async fn per_stream_write_order_is_preserved() {
    let config = LaunchConfig::new(["sh", "-c", r#"printf 'one\ntwo\nthree\n'"#])
        .total_timeout(Duration::from_secs(5));
    let mut supervisor = ProcessSupervisor::spawn(&config, &ctx()).unwrap();
    let mut probe = Probe::default();

    let code = supervisor.run(&mut probe).await.unwrap();

    assert_eq!(code, 0);
    assert_eq!(probe.stdout, vec!["one\n", "two\n", "three\n"]);
}

#[cfg(unix)]
#[tokio::test]
async fn nonzero_exit_passes_through() {
    let config = LaunchConfig::new(["sh", "-c", "exit 42"]);
    let mut supervisor = ProcessSupervisor::spawn(&config, &ctx()).unwrap();
    let mut probe = Probe::default();

    let code = supervisor.run(&mut probe).await.unwrap();

    assert_eq!(code, 42);
    assert_eq!(probe.terminate_calls, vec![42]);
}

#[cfg(unix)]
#[tokio::test]
async fn trailing_fragment_without_newline_is_delivered() {
    let config = LaunchConfig::new(["sh", "-c", r#"printf 'complete\nfragment'"#])
        .total_timeout(Duration::from_secs(5));
    let mut supervisor = ProcessSupervisor::spawn(&config, &ctx()).unwrap();
    let mut probe = Probe::default();

    supervisor.run(&mut probe).await.unwrap();

    assert_eq!(probe.stdout, vec!["complete\n", "fragment"]);
}

#[tokio::test]
async fn launch_failure_surfaces_immediately() {
    let config = LaunchConfig::new(["procpump-test-no-such-binary-xyz"]);
    let result = ProcessSupervisor::spawn(&config, &ctx());
    assert!(matches!(result, Err(LaunchError::NotFound(_))));
}

#[cfg(unix)]
#[tokio::test]
async fn is_done_starts_termination_but_buffered_output_arrives() {
    let config = LaunchConfig::new([
        "sh",
        "-c",
        r#"printf 'READY\nafter-marker\n'; sleep 30"#,
    ]);
    let mut supervisor = ProcessSupervisor::spawn(&config, &ctx()).unwrap();
    let mut probe = Probe {
        done_marker: Some("READY".to_string()),
        ..Probe::default()
    };

    let start = std::time::Instant::now();
    let code = supervisor.run(&mut probe).await.unwrap();

    // Graceful signal death, well before the 30s sleep.
    assert_eq!(code, -15);
    assert!(start.elapsed() < Duration::from_secs(10));
    assert_eq!(probe.stdout, vec!["READY\n", "after-marker\n"]);
    assert_eq!(probe.terminate_calls, vec![-15]);
}

#[cfg(unix)]
#[tokio::test]
async fn cancellation_token_triggers_graceful_termination() {
    let ctx = ctx();
    let token = ctx.cancellation_token();
    let config = LaunchConfig::new(["sleep", "30"]);
    let mut supervisor = ProcessSupervisor::spawn(&config, &ctx).unwrap();
    let mut probe = Probe::default();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let start = std::time::Instant::now();
    let code = supervisor.run(&mut probe).await.unwrap();

    assert_eq!(code, -15);
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[cfg(unix)]
#[tokio::test]
async fn handler_fault_aborts_the_pump_and_kills_the_child() {
    use procpump::handler::{HandlerError, OutputHandler};
    use procpump::supervisor::SupervisorError;

    struct Faulty;
    impl OutputHandler for Faulty {
        fn handle_stdout(&mut self, _line: &str) -> Result<(), HandlerError> {
            Err(HandlerError::msg("injected fault"))
        }
    }

    let config = LaunchConfig::new(["sh", "-c", r#"printf 'x\n'; sleep 30"#]);
    let mut supervisor = ProcessSupervisor::spawn(&config, &ctx()).unwrap();
    let mut handler = Faulty;

    let start = std::time::Instant::now();
    let result = supervisor.run(&mut handler).await;

    assert!(matches!(result, Err(SupervisorError::Handler(_))));
    // The fault propagates without waiting out the 30s sleep.
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[cfg(unix)]
#[tokio::test]
async fn control_calls_after_completion_are_noops() {
    let config = LaunchConfig::new(["echo", "done"]);
    let mut supervisor = ProcessSupervisor::spawn(&config, &ctx()).unwrap();
    let control = supervisor.control();
    let mut probe = Probe::default();

    let code = supervisor.run(&mut probe).await.unwrap();
    assert_eq!(code, 0);

    // The pid is gone; these must neither signal a recycled pid nor panic.
    control.terminate();
    control.kill();
}
