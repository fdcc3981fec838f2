//! Launch configuration and the child process handle.
//!
//! `ProcessHandle` holds, but does not inherit from, the OS child process; the
//! supervisor sees only the narrow operations it actually needs.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

/// Error type for process launch.
#[derive(thiserror::Error, Debug)]
pub enum LaunchError {
    /// The command argv was empty.
    #[error("Launch command is empty")]
    EmptyCommand,
    /// The binary was not found.
    #[error("Command not found: {0}")]
    NotFound(String),
    /// Permission denied when spawning.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// A stdio handle was missing after spawn.
    #[error("Child {0} stream not available")]
    StreamUnavailable(&'static str),
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LaunchError {
    fn from_io(err: std::io::Error, program: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(program.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(program.to_string()),
            _ => Self::Io(err),
        }
    }
}

/// Builder for a supervised launch.
#[derive(Debug, Clone, Default)]
pub struct LaunchConfig {
    argv: Vec<String>,
    current_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
    total_timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
    wrapped: bool,
}

impl LaunchConfig {
    /// Create a config for the given argv.
    #[must_use]
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Set the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Add an environment variable on top of the inherited environment.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the total wall-clock timeout.
    #[must_use]
    pub fn total_timeout(mut self, timeout: Duration) -> Self {
        self.total_timeout = Some(timeout);
        self
    }

    /// Set the output-idle timeout, reset on every delivered line.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Mark the launch as going through a virtual-display wrapper whose
    /// payload, not the wrapper itself, must receive signals.
    #[must_use]
    pub fn wrapped(mut self, wrapped: bool) -> Self {
        self.wrapped = wrapped;
        self
    }

    /// The full argv.
    #[must_use]
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// The total wall-clock timeout, if set.
    #[must_use]
    pub fn get_total_timeout(&self) -> Option<Duration> {
        self.total_timeout
    }

    /// The output-idle timeout, if set.
    #[must_use]
    pub fn get_idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    /// Whether the launch goes through a wrapper.
    #[must_use]
    pub fn is_wrapped(&self) -> bool {
        self.wrapped
    }
}

/// A running child process with redirected output streams.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    command: Vec<String>,
}

impl ProcessHandle {
    /// Spawn the configured command with both output streams piped.
    ///
    /// `overlay` is applied before the config's own environment entries, so
    /// per-launch values win over context-wide ones.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError` if the argv is empty or the OS cannot create the
    /// process. No supervisor state exists on failure.
    pub fn spawn(config: &LaunchConfig, overlay: &[(String, String)]) -> Result<Self, LaunchError> {
        let (program, args) = config.argv.split_first().ok_or(LaunchError::EmptyCommand)?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(ref dir) = config.current_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in overlay.iter().chain(config.env.iter()) {
            cmd.env(key, value);
        }

        let child = cmd.spawn().map_err(|e| LaunchError::from_io(e, program))?;
        tracing::debug!(pid = ?child.id(), command = %program, "Spawned child process");

        Ok(Self {
            child,
            command: config.argv.clone(),
        })
    }

    /// The launch command.
    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// The process ID, if the process has not yet been reaped.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Check for exit without blocking, reaping the process if it has exited.
    ///
    /// # Errors
    ///
    /// Returns an error if the process state cannot be queried.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Send the forceful kill without waiting for exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill cannot be delivered.
    pub fn start_kill(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }
}
