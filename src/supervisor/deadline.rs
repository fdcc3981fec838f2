//! Deadline bookkeeping for the pump loop.

use std::time::Duration;

use tokio::time::Instant;

/// The four deadlines driving pump scheduling.
///
/// `total` and the escalation deadlines are set at most once; `idle` resets on
/// every delivered line. Once `kill` is set it dominates `terminate` for all
/// scheduling decisions, and `min(total, idle)` matters only while neither
/// escalation deadline is armed.
#[derive(Debug, Clone, Default)]
pub struct DeadlineSet {
    total: Option<Instant>,
    idle: Option<Instant>,
    terminate: Option<Instant>,
    kill: Option<Instant>,
    total_fired: bool,
    idle_fired: bool,
}

impl DeadlineSet {
    /// An empty set with no deadlines armed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the total wall-clock deadline. First call wins.
    pub fn arm_total(&mut self, at: Instant) {
        if self.total.is_none() {
            self.total = Some(at);
        }
    }

    /// Reset the output-idle deadline. Called once at start and on every line.
    pub fn reset_idle(&mut self, at: Instant) {
        self.idle = Some(at);
    }

    /// Arm the graceful-shutdown deadline. Returns whether this call armed it.
    pub fn arm_terminate(&mut self, at: Instant) -> bool {
        if self.terminate.is_none() {
            self.terminate = Some(at);
            true
        } else {
            false
        }
    }

    /// Arm the forceful-shutdown deadline. Returns whether this call armed it.
    pub fn arm_kill(&mut self, at: Instant) -> bool {
        if self.kill.is_none() {
            self.kill = Some(at);
            true
        } else {
            false
        }
    }

    /// Whether the total deadline is due and has not fired yet. Marks it fired.
    pub fn take_total_due(&mut self, now: Instant) -> bool {
        if self.total_fired {
            return false;
        }
        if self.total.is_some_and(|at| now >= at) {
            self.total_fired = true;
            return true;
        }
        false
    }

    /// Whether the idle deadline is due and has not fired yet. Marks it fired.
    pub fn take_idle_due(&mut self, now: Instant) -> bool {
        if self.idle_fired {
            return false;
        }
        if self.idle.is_some_and(|at| now >= at) {
            self.idle_fired = true;
            return true;
        }
        false
    }

    /// Whether the graceful window has elapsed.
    #[must_use]
    pub fn terminate_due(&self, now: Instant) -> bool {
        self.terminate.is_some_and(|at| now >= at)
    }

    /// Whether the forceful window has elapsed.
    #[must_use]
    pub fn kill_due(&self, now: Instant) -> bool {
        self.kill.is_some_and(|at| now >= at)
    }

    /// The next instant the pump must wake at.
    ///
    /// Priority: `kill` if set, else `terminate` if set, else the earlier of
    /// the not-yet-fired `total` and `idle` deadlines. The result is clamped
    /// to `now + shutdown_wait` so escalation reacts promptly even under
    /// deadline churn.
    #[must_use]
    pub fn next_wake(&self, now: Instant, shutdown_wait: Duration) -> Instant {
        let ceiling = now + shutdown_wait;

        let total = if self.total_fired { None } else { self.total };
        let idle = if self.idle_fired { None } else { self.idle };
        let target = self
            .kill
            .or(self.terminate)
            .or(match (total, idle) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (one, other) => one.or(other),
            })
            .unwrap_or(ceiling);

        target.min(ceiling)
    }
}
