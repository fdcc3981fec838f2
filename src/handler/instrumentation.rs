//! Android instrumentation result parsing stage.

use std::collections::BTreeMap;

use super::{HandlerError, OutputHandler};

/// Per-test verdict from an instrumentation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentationStatus {
    Passed,
    Failed,
    Error,
}

impl InstrumentationStatus {
    /// Map an `INSTRUMENTATION_STATUS_CODE` value.
    ///
    /// `1` is "start"; the terminal codes are `0` (ok), `-1` (error) and
    /// `-2` (failure). Unknown codes count as errors.
    fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => None,
            0 => Some(Self::Passed),
            -2 => Some(Self::Failed),
            _ => Some(Self::Error),
        }
    }
}

/// Parses `am instrument -r` style output and overrides the final status.
///
/// Accumulates `INSTRUMENTATION_STATUS:` key-value pairs until an
/// `INSTRUMENTATION_STATUS_CODE:` line closes the block, then records the
/// verdict for the block's `test` key. A final `INSTRUMENTATION_CODE:` line
/// marks the run complete.
pub struct InstrumentationResultHandler {
    next: Box<dyn OutputHandler>,
    block: BTreeMap<String, String>,
    results: Vec<(String, InstrumentationStatus)>,
    finished: bool,
}

impl InstrumentationResultHandler {
    #[must_use]
    pub fn new(next: Box<dyn OutputHandler>) -> Self {
        Self {
            next,
            block: BTreeMap::new(),
            results: Vec::new(),
            finished: false,
        }
    }

    /// Verdicts recorded so far, in completion order.
    #[must_use]
    pub fn results(&self) -> &[(String, InstrumentationStatus)] {
        &self.results
    }

    /// Whether any test failed or errored.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.results
            .iter()
            .any(|(_, status)| *status != InstrumentationStatus::Passed)
    }

    fn parse(&mut self, line: &str) {
        let line = line.trim_end();
        if let Some(rest) = line.strip_prefix("INSTRUMENTATION_STATUS: ") {
            if let Some((key, value)) = rest.split_once('=') {
                self.block.insert(key.to_string(), value.to_string());
            }
        } else if let Some(rest) = line.strip_prefix("INSTRUMENTATION_STATUS_CODE: ") {
            let code = rest.trim().parse::<i32>().unwrap_or(-1);
            if let Some(status) = InstrumentationStatus::from_code(code) {
                let name = self
                    .block
                    .get("test")
                    .cloned()
                    .unwrap_or_else(|| "<unknown>".to_string());
                self.results.push((name, status));
            }
            self.block.clear();
        } else if line.starts_with("INSTRUMENTATION_CODE: ") {
            self.finished = true;
        }
    }
}

impl OutputHandler for InstrumentationResultHandler {
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
        self.finished || self.next.is_done()
    }

    fn handle_terminate(&mut self, returncode: i32) -> Result<i32, HandlerError> {
        let verdict = if self.has_failures() {
            1
        } else if self.finished {
            0
        } else if returncode == 0 {
            // Never saw the closing code line; a clean exit is still suspect.
            1
        } else {
            returncode
        };
        self.next.handle_terminate(verdict)
    }
}
