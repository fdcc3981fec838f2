//! Handler chains composed over real supervised processes.

use std::time::Duration;

use procpump::handler::{
    BaseHandler, CrashMonitorHandler, GtestResultHandler, SignalStatusHandler, TeeHandler,
};
use procpump::process::LaunchConfig;
use procpump::supervisor::ProcessSupervisor;

use super::ctx;

#[cfg(unix)]
#[tokio::test]
async fn gtest_chain_overrides_a_signal_death_with_the_parsed_verdict() {
    // The runner prints a complete passing suite and then wedges; the parser
    // requests completion and the verdict wins over the signal status.
    let script = r#"
printf '[ RUN      ] Suite.One\n'
printf '[       OK ] Suite.One (1 ms)\n'
printf '[==========] 1 test from 1 test suite ran. (1 ms total)\n'
sleep 30
"#;
    let config = LaunchConfig::new(["sh", "-c", script]);
    let mut supervisor = ProcessSupervisor::spawn(&config, &ctx()).unwrap();

    let mut handler = GtestResultHandler::new(Box::new(BaseHandler));
    let code = supervisor.run(&mut handler).await.unwrap();

    assert_eq!(code, 0);
    assert!(handler.summary_seen());
    assert_eq!(handler.passed_tests(), &["Suite.One".to_string()]);
}

#[cfg(unix)]
#[tokio::test]
async fn gtest_chain_reports_failures_despite_exit_zero() {
    let script = r#"
printf '[ RUN      ] Suite.Bad\n'
printf '[  FAILED  ] Suite.Bad (2 ms)\n'
printf '[==========] 1 test from 1 test suite ran. (2 ms total)\n'
exit 0
"#;
    let config = LaunchConfig::new(["sh", "-c", script]);
    let mut supervisor = ProcessSupervisor::spawn(&config, &ctx()).unwrap();

    let mut handler = GtestResultHandler::new(Box::new(BaseHandler));
    let code = supervisor.run(&mut handler).await.unwrap();

    assert_eq!(code, 1);
    assert_eq!(handler.failed_tests(), &["Suite.Bad".to_string()]);
}

#[cfg(unix)]
#[tokio::test]
async fn tee_records_both_streams_while_forwarding() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("side.log");

    let config = LaunchConfig::new(["sh", "-c", r#"printf 'out\n'; printf 'err\n' >&2"#])
        .total_timeout(Duration::from_secs(5));
    let mut supervisor = ProcessSupervisor::spawn(&config, &ctx()).unwrap();

    let mut handler = TeeHandler::create(&path, Box::new(BaseHandler)).unwrap();
    let code = supervisor.run(&mut handler).await.unwrap();
    assert_eq!(code, 0);

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("out\n"));
    assert!(contents.contains("err\n"));
}

#[cfg(unix)]
#[tokio::test]
async fn crash_monitor_stops_a_wedged_run_early() {
    let script = r#"
printf 'starting\n'
printf 'Segmentation fault\n' >&2
printf '    #00 pc 0001f4a2  /system/lib/libc.so\n' >&2
sleep 30
"#;
    let config = LaunchConfig::new(["sh", "-c", script]);
    let mut supervisor = ProcessSupervisor::spawn(&config, &ctx()).unwrap();

    let mut handler = CrashMonitorHandler::new(Box::new(BaseHandler)).stop_on_crash();
    let start = std::time::Instant::now();
    let code = supervisor.run(&mut handler).await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(10));
    assert!(handler.has_crashed());
    assert_eq!(handler.crash_addresses(), &[0x0001_f4a2]);
    assert_eq!(code, -15);
}

#[cfg(unix)]
#[tokio::test]
async fn signal_status_stage_remaps_an_intentional_termination_to_success() {
    let config = LaunchConfig::new(["sleep", "30"]).total_timeout(Duration::from_secs(1));
    let mut supervisor = ProcessSupervisor::spawn(&config, &ctx()).unwrap();

    // Died from our own graceful signal: report success.
    let mut handler = SignalStatusHandler::new(Box::new(BaseHandler), -15, 0);
    let code = supervisor.run(&mut handler).await.unwrap();

    assert_eq!(code, 0);
}
