//! GoogleTest-style result parsing stage.

use super::{HandlerError, OutputHandler};

/// Parses GoogleTest runner output and overrides the final status.
///
/// Tracks `[ RUN      ]` / `[       OK ]` / `[  FAILED  ]` lines and
/// considers the run complete at the `[==========]` summary. On terminate the
/// raw status is replaced with the parsed verdict: a clean run that reported
/// failures is a failure, and a run the supervisor had to stop is a failure
/// even if the raw status was remapped upstream.
pub struct GtestResultHandler {
    next: Box<dyn OutputHandler>,
    started: Vec<String>,
    passed: Vec<String>,
    failed: Vec<String>,
    summary_seen: bool,
}

impl GtestResultHandler {
    #[must_use]
    pub fn new(next: Box<dyn OutputHandler>) -> Self {
        Self {
            next,
            started: Vec::new(),
            passed: Vec::new(),
            failed: Vec::new(),
            summary_seen: false,
        }
    }

    /// Names of tests that failed, in report order.
    #[must_use]
    pub fn failed_tests(&self) -> &[String] {
        &self.failed
    }

    /// Names of tests that passed, in report order.
    #[must_use]
    pub fn passed_tests(&self) -> &[String] {
        &self.passed
    }

    /// Whether the final summary banner has been seen.
    #[must_use]
    pub fn summary_seen(&self) -> bool {
        self.summary_seen
    }

    fn parse(&mut self, line: &str) {
        let line = line.trim_end();
        if let Some(name) = line.strip_prefix("[ RUN      ] ") {
            self.started.push(test_name(name));
        } else if let Some(rest) = line.strip_prefix("[       OK ] ") {
            self.passed.push(test_name(rest));
        } else if let Some(rest) = line.strip_prefix("[  FAILED  ] ") {
            let name = test_name(rest);
            // The summary repeats failures; count each test once.
            if !self.failed.contains(&name) {
                self.failed.push(name);
            }
        } else if line.starts_with("[==========]") && line.contains(" ran.") {
            self.summary_seen = true;
        }
    }
}

/// Strip a trailing ` (12 ms)` annotation from a result line.
fn test_name(rest: &str) -> String {
    match rest.find(" (") {
        Some(pos) => rest[..pos].to_string(),
        None => rest.to_string(),
    }
}

impl OutputHandler for GtestResultHandler {
    fn handle_stdout(&mut self, line: &str) -> Result<(), HandlerError> {
        self.parse(line);
        self.next.handle_stdout(line)
    }

    fn handle_stderr(&mut self, line: &str) -> Result<(), HandlerError> {
        self.next.handle_stderr(line)
    }

    fn handle_timeout(&mut self) -> Result<(), HandlerError> {
        self.next.handle_timeout()
    }

    fn is_done(&self) -> bool {
        self.summary_seen || self.next.is_done()
    }

    fn handle_terminate(&mut self, returncode: i32) -> Result<i32, HandlerError> {
        let verdict = if !self.failed.is_empty() {
            tracing::info!(failed = self.failed.len(), "Test run had failures");
            1
        } else if self.summary_seen {
            0
        } else {
            // No summary: the runner died mid-flight, keep the raw status
            // unless it claims success.
            if let Some(name) = self.started.last() {
                tracing::warn!(test = %name, "Runner stopped without a summary, last test started");
            }
            if returncode == 0 {
                1
            } else {
                returncode
            }
        };
        self.next.handle_terminate(verdict)
    }
}
