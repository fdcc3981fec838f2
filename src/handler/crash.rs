//! Crash-signature scanning stage.

use regex::Regex;

use super::{HandlerError, OutputHandler};

/// Default crash signatures: fatal log lines, assertion failures, and
/// signal-death banners from the runtime under test.
const SIGNATURE_PATTERNS: &[&str] = &[
    r"^\[FATAL",
    r"FATAL:",
    r"Check failed:",
    r"Segmentation fault",
    r"terminating with uncaught exception",
    r"Fatal signal \d+ \(SIG",
];

/// Stack-frame line carrying a code address, e.g. `  #03 pc 0001f4a2  /system/lib/libc.so`.
const FRAME_PATTERN: &str = r"#\d+\s+pc\s+([0-9a-fA-F]+)";

/// Scans both streams for crash signatures, then forwards.
///
/// Collects stack-frame addresses for later symbolization and fires an
/// attach callback on the first signature match, which is where the debugger
/// attach flow hangs off. Optionally requests early completion once a crash
/// is seen, so a flakiness detector can stop a wedged run.
pub struct CrashMonitorHandler {
    next: Box<dyn OutputHandler>,
    signatures: Vec<Regex>,
    frame: Option<Regex>,
    addresses: Vec<u64>,
    crashed: bool,
    stop_on_crash: bool,
    on_crash: Option<Box<dyn FnMut(&str) + Send>>,
}

impl CrashMonitorHandler {
    /// Create a monitor with the default signature set.
    #[must_use]
    pub fn new(next: Box<dyn OutputHandler>) -> Self {
        let signatures = SIGNATURE_PATTERNS
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    tracing::warn!(pattern, error = %e, "Failed to compile crash signature");
                    None
                }
            })
            .collect();
        let frame = match Regex::new(FRAME_PATTERN) {
            Ok(regex) => Some(regex),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to compile frame pattern");
                None
            }
        };
        Self {
            next,
            signatures,
            frame,
            addresses: Vec::new(),
            crashed: false,
            stop_on_crash: false,
            on_crash: None,
        }
    }

    /// Add a custom signature pattern.
    ///
    /// # Errors
    ///
    /// Returns `HandlerError::Other` if the pattern is not a valid regex.
    pub fn add_signature(&mut self, pattern: &str) -> Result<(), HandlerError> {
        let regex = Regex::new(pattern)
            .map_err(|e| HandlerError::msg(format!("invalid crash pattern {pattern:?}: {e}")))?;
        self.signatures.push(regex);
        Ok(())
    }

    /// Request early completion once a crash signature is seen.
    #[must_use]
    pub fn stop_on_crash(mut self) -> Self {
        self.stop_on_crash = true;
        self
    }

    /// Fire `callback` with the matching line on the first signature match.
    ///
    /// The callback runs on the pump and must not block; a debugger attach
    /// flow should only trigger its side channel here.
    #[must_use]
    pub fn with_crash_callback(mut self, callback: Box<dyn FnMut(&str) + Send>) -> Self {
        self.on_crash = Some(callback);
        self
    }

    /// Whether a crash signature has been observed.
    #[must_use]
    pub fn has_crashed(&self) -> bool {
        self.crashed
    }

    /// Stack-frame addresses collected so far, in stream order.
    #[must_use]
    pub fn crash_addresses(&self) -> &[u64] {
        &self.addresses
    }

    fn scan(&mut self, line: &str) {
        if !self.crashed && self.signatures.iter().any(|regex| regex.is_match(line)) {
            self.crashed = true;
            tracing::warn!(line = line.trim_end(), "Crash signature detected");
            if let Some(callback) = &mut self.on_crash {
                callback(line);
            }
        }
        if let Some(frame) = &self.frame {
            if let Some(captures) = frame.captures(line) {
                if let Some(address) = captures
                    .get(1)
                    .and_then(|m| u64::from_str_radix(m.as_str(), 16).ok())
                {
                    self.addresses.push(address);
                }
            }
        }
    }
}

impl OutputHandler for CrashMonitorHandler {
    fn handle_stdout(&mut self, line: &str) -> Result<(), HandlerError> {
        self.scan(line);
        self.next.handle_stdout(line)
    }

    fn handle_stderr(&mut self, line: &str) -> Result<(), HandlerError> {
        self.scan(line);
        self.next.handle_stderr(line)
    }

    fn handle_timeout(&mut self) -> Result<(), HandlerError> {
        self.next.handle_timeout()
    }

    fn is_done(&self) -> bool {
        (self.stop_on_crash && self.crashed) || self.next.is_done()
    }

    fn handle_terminate(&mut self, returncode: i32) -> Result<i32, HandlerError> {
        self.next.handle_terminate(returncode)
    }
}
