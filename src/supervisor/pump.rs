//! The supervisor proper: the multiplexed pump loop.

use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::{ChildStderr, ChildStdout};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::context::RuntimeContext;
use crate::handler::{HandlerError, OutputHandler};
use crate::process::{LaunchConfig, LaunchError, ProcessHandle, SubprocessGroupSignaler};

use super::control::SupervisorControl;
use super::reader::{StreamKind, StreamReader};

/// Status synthesized when the child cannot be reaped even after the forceful
/// signal: the conventional encoding of death by SIGKILL.
pub const UNRESPONSIVE_STATUS: i32 = -9;

/// Error type for a supervised run.
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    /// A handler hook failed; the pump was aborted.
    #[error("Output handler failed: {0}")]
    Handler(#[from] HandlerError),
    /// I/O error while pumping output or querying the process.
    #[error("I/O error while pumping output: {0}")]
    Io(#[from] std::io::Error),
}

/// Supervises one child process: owns its handle and both stream readers,
/// runs the multiplexed pump loop, and drives the termination state machine.
#[derive(Debug)]
pub struct ProcessSupervisor {
    process: ProcessHandle,
    stdout: StreamReader<ChildStdout>,
    stderr: StreamReader<ChildStderr>,
    control: SupervisorControl,
    cancel: CancellationToken,
    total_timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
    exit_code: Option<i32>,
}

impl ProcessSupervisor {
    /// Launch the configured command under supervision.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError` if the OS cannot create the process; no
    /// supervisor state exists on failure.
    pub fn spawn(config: &LaunchConfig, ctx: &RuntimeContext) -> Result<Self, LaunchError> {
        let mut process = ProcessHandle::spawn(config, ctx.env())?;
        let stdout = process
            .take_stdout()
            .ok_or(LaunchError::StreamUnavailable("stdout"))?;
        let stderr = process
            .take_stderr()
            .ok_or(LaunchError::StreamUnavailable("stderr"))?;

        let signaler = if config.is_wrapped() {
            SubprocessGroupSignaler::wrapped(ctx.helper_process_name())
        } else {
            SubprocessGroupSignaler::direct()
        };
        let control = SupervisorControl::new(signaler, process.id(), ctx.shutdown_wait());

        Ok(Self {
            process,
            stdout: StreamReader::new(stdout, StreamKind::Stdout),
            stderr: StreamReader::new(stderr, StreamKind::Stderr),
            control,
            cancel: ctx.cancellation_token(),
            total_timeout: config.get_total_timeout(),
            idle_timeout: config.get_idle_timeout(),
            exit_code: None,
        })
    }

    /// The control handle for this supervisor, safe to hand to other threads.
    #[must_use]
    pub fn control(&self) -> SupervisorControl {
        self.control.clone()
    }

    /// The child's process ID, if not yet reaped.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.process.id()
    }

    /// Pump output through the handler chain until the process is finished.
    ///
    /// Blocks the caller until both streams are closed and the process is
    /// reaped, or until the forceful window elapses and the supervisor gives
    /// up. Returns the final status code, which the handler chain may have
    /// overridden via `handle_terminate`.
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError::Handler` if a handler hook fails (the child
    /// is killed best-effort first) and `SupervisorError::Io` for pump I/O
    /// failures.
    pub async fn run(&mut self, handler: &mut dyn OutputHandler) -> Result<i32, SupervisorError> {
        let now = Instant::now();
        if let Some(timeout) = self.total_timeout {
            self.control.arm_total(now + timeout);
        }
        if let Some(timeout) = self.idle_timeout {
            self.control.reset_idle(now + timeout);
        }

        if let Err(e) = self.pump(handler).await {
            // Do not leak the child past an aborted pump.
            self.control.kill();
            let _ = self.process.start_kill();
            return Err(e);
        }

        let raw = self.exit_code.unwrap_or(UNRESPONSIVE_STATUS);
        match handler.handle_terminate(raw) {
            Ok(code) => Ok(code),
            Err(e) => {
                self.control.kill();
                Err(SupervisorError::Handler(e))
            }
        }
    }

    async fn pump(&mut self, handler: &mut dyn OutputHandler) -> Result<(), SupervisorError> {
        let mut cancel_handled = false;
        loop {
            let wake = self.control.next_wake(Instant::now());
            let mut batch: Vec<(StreamKind, String)> = Vec::new();
            let mut drained = false;

            {
                let Self {
                    stdout,
                    stderr,
                    control,
                    cancel,
                    ..
                } = &mut *self;

                tokio::select! {
                    lines = stdout.drain(), if !stdout.is_closed() => {
                        drained = true;
                        for line in lines? {
                            batch.push((StreamKind::Stdout, line));
                        }
                    }
                    lines = stderr.drain(), if !stderr.is_closed() => {
                        drained = true;
                        for line in lines? {
                            batch.push((StreamKind::Stderr, line));
                        }
                    }
                    () = control.wait_for_wake() => {}
                    () = cancel.cancelled(), if !cancel_handled => {
                        cancel_handled = true;
                        tracing::info!("Runtime context cancelled, terminating supervised process");
                        control.terminate();
                    }
                    () = tokio::time::sleep_until(wake) => {}
                }
            }

            for (kind, line) in &batch {
                if let Some(idle) = self.idle_timeout {
                    self.control.reset_idle(Instant::now() + idle);
                }
                match kind {
                    StreamKind::Stdout => handler.handle_stdout(line)?,
                    StreamKind::Stderr => handler.handle_stderr(line)?,
                }
            }

            let now = Instant::now();
            if self.control.take_total_due(now) {
                tracing::info!(pid = ?self.process.id(), "Total deadline elapsed");
                handler.handle_timeout()?;
                self.control.terminate();
            }
            if self.control.take_idle_due(now) {
                tracing::info!(pid = ?self.process.id(), "Output-idle deadline elapsed");
                // Whether silence is fatal is the handler's policy; a handler
                // that wants it fatal calls terminate() from inside the hook.
                handler.handle_timeout()?;
            }
            self.control.escalate_if_due(now);
            if self.control.take_pending_force_kill() {
                let _ = self.process.start_kill();
            }

            if self.exit_code.is_none() {
                if let Some(status) = self.process.try_wait()? {
                    self.exit_code = Some(exit_code_of(status));
                    self.control.mark_reaped();
                    tracing::debug!(code = self.exit_code, "Child process reaped");
                }
            }

            if self.control.give_up_if_due(Instant::now()) {
                if self.exit_code.is_none() {
                    tracing::warn!(
                        pid = ?self.process.id(),
                        "Process unreaped after forceful window, giving up"
                    );
                }
                return Ok(());
            }

            // Completion has drain granularity: the query runs only after a
            // read, never continuously.
            if drained && !self.control.state().is_stopping() && handler.is_done() {
                tracing::debug!("Handler reported completion, terminating");
                self.control.terminate();
            }

            if self.exit_code.is_some() && self.stdout.is_closed() && self.stderr.is_closed() {
                self.control.finish();
                return Ok(());
            }
        }
    }
}

/// Collapse an `ExitStatus` to the supervisor's status convention: the exit
/// code when the process exited, `-N` when it died from signal N.
fn exit_code_of(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    status.code().unwrap_or(-1)
}
