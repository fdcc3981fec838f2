//! Async control surface shared between the pump and external callers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::process::SubprocessGroupSignaler;

use super::deadline::DeadlineSet;
use super::state::TerminationState;

#[derive(Debug)]
struct Inner {
    state: TerminationState,
    deadlines: DeadlineSet,
    reaped: bool,
}

#[derive(Debug)]
struct Shared {
    // The one mutex: every deadline mutation and state transition goes
    // through it, including timer callbacks running on other threads.
    inner: Mutex<Inner>,
    wake: Notify,
    signaler: SubprocessGroupSignaler,
    pid: Option<u32>,
    shutdown_wait: Duration,
    // Forceful-delivery flag for platforms without signal support; the pump
    // consumes it and calls `Child::start_kill`.
    force_kill: AtomicBool,
}

/// Cloneable handle for requesting termination of a supervised process.
///
/// `terminate`, `kill`, and `terminate_later` may be called from any thread
/// at any time, including concurrently with each other and with the pump's
/// own escalation. Each is idempotent per escalation level; after the process
/// has been reaped they still advance the state machine but no signal leaves
/// the supervisor. Signal delivery is fire-and-forget and never happens while
/// the state mutex is held.
#[derive(Debug, Clone)]
pub struct SupervisorControl {
    shared: Arc<Shared>,
}

impl SupervisorControl {
    pub(crate) fn new(
        signaler: SubprocessGroupSignaler,
        pid: Option<u32>,
        shutdown_wait: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: TerminationState::Running,
                    deadlines: DeadlineSet::new(),
                    reaped: false,
                }),
                wake: Notify::new(),
                signaler,
                pid,
                shutdown_wait,
                force_kill: AtomicBool::new(false),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(inner: &mut Inner, to: TerminationState) {
        if inner.state < to {
            tracing::debug!(from = ?inner.state, to = ?to, "Termination state transition");
            inner.state = to;
        }
    }

    /// Request graceful termination.
    ///
    /// The first call sends the graceful signal to the resolved target set
    /// and arms the graceful window; later calls are no-ops.
    pub fn terminate(&self) {
        let deadline = Instant::now() + self.shared.shutdown_wait;
        let send = {
            let mut inner = self.lock();
            if inner.state >= TerminationState::TerminateRequested {
                false
            } else {
                Self::transition(&mut inner, TerminationState::TerminateRequested);
                // Arm the window even post-reap: it still bounds a pump that
                // is waiting on pipes inherited by a grandchild.
                inner.deadlines.arm_terminate(deadline);
                !inner.reaped
            }
        };
        if send {
            tracing::info!(pid = ?self.shared.pid, "Requesting graceful termination");
            self.deliver(false);
        }
        self.shared.wake.notify_one();
    }

    /// Request forceful termination, skipping the graceful step if it has not
    /// already started.
    ///
    /// The first call sends the forceful signal and arms the final window;
    /// later calls are no-ops.
    pub fn kill(&self) {
        let deadline = Instant::now() + self.shared.shutdown_wait;
        let send = {
            let mut inner = self.lock();
            if inner.state >= TerminationState::KillRequested {
                false
            } else {
                Self::transition(&mut inner, TerminationState::KillRequested);
                inner.deadlines.arm_kill(deadline);
                !inner.reaped
            }
        };
        if send {
            tracing::info!(pid = ?self.shared.pid, "Requesting forceful termination");
            self.deliver(true);
        }
        self.shared.wake.notify_one();
    }

    /// Request graceful termination after `delay`.
    ///
    /// The timer task goes through the same mutex as every other caller, so
    /// it cannot race the pump's own escalation into a conflicting state.
    pub fn terminate_later(&self, delay: Duration) -> tokio::task::JoinHandle<()> {
        let control = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            control.terminate();
        })
    }

    /// The current termination state.
    #[must_use]
    pub fn state(&self) -> TerminationState {
        self.lock().state
    }

    /// Whether the supervisor has finished with this process.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state() == TerminationState::Finished
    }

    fn deliver(&self, forceful: bool) {
        #[cfg(unix)]
        {
            use nix::sys::signal::Signal;
            if let Some(pid) = self.shared.pid {
                let signal = if forceful {
                    Signal::SIGKILL
                } else {
                    Signal::SIGTERM
                };
                self.shared.signaler.send(pid, signal);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = forceful;
            self.shared.force_kill.store(true, Ordering::SeqCst);
        }
    }

    // Pump-facing operations below. None of them block while holding the
    // mutex; the pump calls them between multiplexed waits.

    pub(crate) async fn wait_for_wake(&self) {
        self.shared.wake.notified().await;
    }

    pub(crate) fn arm_total(&self, at: Instant) {
        self.lock().deadlines.arm_total(at);
    }

    pub(crate) fn reset_idle(&self, at: Instant) {
        self.lock().deadlines.reset_idle(at);
    }

    pub(crate) fn next_wake(&self, now: Instant) -> Instant {
        self.lock().deadlines.next_wake(now, self.shared.shutdown_wait)
    }

    pub(crate) fn take_total_due(&self, now: Instant) -> bool {
        self.lock().deadlines.take_total_due(now)
    }

    pub(crate) fn take_idle_due(&self, now: Instant) -> bool {
        self.lock().deadlines.take_idle_due(now)
    }

    /// Escalate to the forceful level if the graceful window has elapsed.
    pub(crate) fn escalate_if_due(&self, now: Instant) {
        let due = {
            let inner = self.lock();
            inner.state == TerminationState::TerminateRequested
                && inner.deadlines.terminate_due(now)
        };
        if due {
            tracing::warn!(
                pid = ?self.shared.pid,
                "Graceful window elapsed without exit, escalating to kill"
            );
            self.kill();
        }
    }

    /// Give up if the forceful window has elapsed without the loop finishing.
    ///
    /// Returns true exactly once, transitioning to `Finished`.
    pub(crate) fn give_up_if_due(&self, now: Instant) -> bool {
        let mut inner = self.lock();
        if inner.state == TerminationState::KillRequested && inner.deadlines.kill_due(now) {
            Self::transition(&mut inner, TerminationState::Finished);
            true
        } else {
            false
        }
    }

    /// Record that the exit status has been observed. Later terminate/kill
    /// calls keep advancing the state machine but send no signal, since the
    /// pid may have been recycled.
    pub(crate) fn mark_reaped(&self) {
        self.lock().reaped = true;
    }

    pub(crate) fn finish(&self) {
        let mut inner = self.lock();
        Self::transition(&mut inner, TerminationState::Finished);
    }

    pub(crate) fn take_pending_force_kill(&self) -> bool {
        self.shared.force_kill.swap(false, Ordering::SeqCst)
    }
}
