//! Termination state machine.

/// Current shutdown stage of a supervised process.
///
/// Transitions are monotonic. `Running` may jump straight to `KillRequested`
/// only via an explicit forceful request; the automatic path always passes
/// through `TerminateRequested`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum TerminationState {
    /// Process running, no shutdown requested.
    #[default]
    Running,
    /// Graceful signal sent, waiting out the shutdown window.
    TerminateRequested,
    /// Forceful signal sent, waiting out the final window.
    KillRequested,
    /// Streams closed and process reaped, or the supervisor gave up.
    Finished,
}

impl TerminationState {
    /// Whether shutdown has been requested at any level.
    #[must_use]
    pub fn is_stopping(self) -> bool {
        self >= Self::TerminateRequested
    }
}
