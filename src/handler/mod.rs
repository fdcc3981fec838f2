//! The output-handler capability set and chain composition.
//!
//! A handler that wants to add behavior owns the next handler and forwards
//! each hook explicitly after performing its own side effect, producing a
//! linear pipeline with O(1) per-line overhead per stage. Every stage must be
//! non-blocking with respect to the pump.

mod crash;
mod gtest;
mod instrumentation;
mod tee;

pub use crash::CrashMonitorHandler;
pub use gtest::GtestResultHandler;
pub use instrumentation::{InstrumentationResultHandler, InstrumentationStatus};
pub use tee::TeeHandler;

/// Error type for handler hooks.
///
/// A hook failure aborts the pump loop; the supervisor kills the child
/// best-effort before propagating it.
#[derive(thiserror::Error, Debug)]
pub enum HandlerError {
    /// I/O error inside a handler (side files, debugger channels).
    #[error("I/O error in output handler: {0}")]
    Io(#[from] std::io::Error),
    /// Any other handler failure.
    #[error("{0}")]
    Other(String),
}

impl HandlerError {
    /// Create an error from a plain message.
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Capability set consumed by the pump loop.
///
/// `handle_stdout`/`handle_stderr` fire exactly once per completed line, in
/// per-stream order; cross-stream interleaving reflects OS delivery order.
/// `handle_timeout` fires at most once per configured deadline kind.
/// `is_done` is polled only immediately after a drain. `handle_terminate`
/// fires exactly once with the OS-observed status (negative for death by
/// signal N); its return value becomes the supervisor's final result.
pub trait OutputHandler: Send {
    /// One completed stdout line, trailing newline included.
    ///
    /// # Errors
    ///
    /// A returned error aborts the pump.
    fn handle_stdout(&mut self, _line: &str) -> Result<(), HandlerError> {
        Ok(())
    }

    /// One completed stderr line, trailing newline included.
    ///
    /// # Errors
    ///
    /// A returned error aborts the pump.
    fn handle_stderr(&mut self, _line: &str) -> Result<(), HandlerError> {
        Ok(())
    }

    /// A total or output-idle deadline elapsed.
    ///
    /// Idle silence is not fatal by itself; a handler that wants it fatal
    /// calls `SupervisorControl::terminate` from inside this hook.
    ///
    /// # Errors
    ///
    /// A returned error aborts the pump.
    fn handle_timeout(&mut self) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Whether the handler has seen everything it needs.
    fn is_done(&self) -> bool {
        false
    }

    /// The final status, with a chance to coerce or veto the raw outcome.
    ///
    /// # Errors
    ///
    /// A returned error becomes the error of `run()`.
    fn handle_terminate(&mut self, returncode: i32) -> Result<i32, HandlerError> {
        Ok(returncode)
    }
}

/// No-op chain terminator.
#[derive(Debug, Default, Clone, Copy)]
pub struct BaseHandler;

impl OutputHandler for BaseHandler {}

/// Remaps "died from our own graceful signal" to a configured status.
///
/// The usual last stage before the terminator: a supervisor that terminated
/// its child on purpose should not report the death as a failure.
pub struct SignalStatusHandler {
    next: Box<dyn OutputHandler>,
    signal_status: i32,
    remapped: i32,
}

impl SignalStatusHandler {
    /// Remap `signal_status` (e.g. `-15` for SIGTERM) to `remapped`.
    #[must_use]
    pub fn new(next: Box<dyn OutputHandler>, signal_status: i32, remapped: i32) -> Self {
        Self {
            next,
            signal_status,
            remapped,
        }
    }
}

impl OutputHandler for SignalStatusHandler {
    fn handle_stdout(&mut self, line: &str) -> Result<(), HandlerError> {
        self.next.handle_stdout(line)
    }

    fn handle_stderr(&mut self, line: &str) -> Result<(), HandlerError> {
        self.next.handle_stderr(line)
    }

    fn handle_timeout(&mut self) -> Result<(), HandlerError> {
        self.next.handle_timeout()
    }

    fn is_done(&self) -> bool {
        self.next.is_done()
    }

    fn handle_terminate(&mut self, returncode: i32) -> Result<i32, HandlerError> {
        let code = if returncode == self.signal_status {
            tracing::debug!(returncode, remapped = self.remapped, "Remapping signal status");
            self.remapped
        } else {
            returncode
        };
        self.next.handle_terminate(code)
    }
}
