//! Supervisor integration tests against real child processes.

mod escalation_test;
mod handlers_test;
mod pump_test;

use std::time::Duration;

use procpump::context::RuntimeContext;
use procpump::handler::{HandlerError, OutputHandler};
use procpump::supervisor::SupervisorControl;

/// Context shared by the supervisor tests: a short shutdown wait so the
/// escalation ladder runs in test time, with log capture installed once.
pub fn ctx() -> RuntimeContext {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    RuntimeContext::new().with_shutdown_wait(Duration::from_secs(1))
}

/// Recording handler used across the supervisor tests.
#[derive(Default)]
pub struct Probe {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub timeouts: usize,
    pub terminate_calls: Vec<i32>,
    /// Report completion once a stdout line contains this marker.
    pub done_marker: Option<String>,
    /// Treat idle silence as fatal by terminating from the timeout hook.
    pub terminate_on_timeout: Option<SupervisorControl>,
    done: bool,
}

impl OutputHandler for Probe {
    fn handle_stdout(&mut self, line: &str) -> Result<(), HandlerError> {
        if let Some(marker) = &self.done_marker {
            if line.contains(marker.as_str()) {
                self.done = true;
            }
        }
        self.stdout.push(line.to_string());
        Ok(())
    }

    fn handle_stderr(&mut self, line: &str) -> Result<(), HandlerError> {
        self.stderr.push(line.to_string());
        Ok(())
    }

    fn handle_timeout(&mut self) -> Result<(), HandlerError> {
        self.timeouts += 1;
        if let Some(control) = &self.terminate_on_timeout {
            control.terminate();
        }
        Ok(())
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn handle_terminate(&mut self, returncode: i32) -> Result<i32, HandlerError> {
        self.terminate_calls.push(returncode);
        Ok(returncode)
    }
}
