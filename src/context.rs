//! Explicit runtime context for supervised launches.
//!
//! The ambient state the orchestration layer used to keep in module-level
//! globals (the shared display override, the process-wide signal handler)
//! lives here as plain fields, constructed at process start and torn down
//! explicitly at exit.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::SupervisorDefaults;

/// Default wait at each shutdown escalation level.
pub const DEFAULT_SHUTDOWN_WAIT: Duration = Duration::from_secs(5);

/// Default name of the display wrapper's helper process.
pub const DEFAULT_HELPER_PROCESS_NAME: &str = "Xvfb";

/// Runtime context shared by supervisors in one orchestration run.
///
/// Holds the shutdown wait, the wrapper helper-process name used by signal
/// target resolution, an environment overlay applied to every launch, and the
/// cancellation token observed by every pump loop.
#[derive(Debug)]
pub struct RuntimeContext {
    shutdown_wait: Duration,
    helper_process_name: String,
    env: Vec<(String, String)>,
    cancel: CancellationToken,
    ctrl_c_task: Option<tokio::task::JoinHandle<()>>,
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeContext {
    /// Create a context with built-in defaults and no signal listener.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shutdown_wait: DEFAULT_SHUTDOWN_WAIT,
            helper_process_name: DEFAULT_HELPER_PROCESS_NAME.to_string(),
            env: Vec::new(),
            cancel: CancellationToken::new(),
            ctrl_c_task: None,
        }
    }

    /// Create a context from loaded defaults.
    #[must_use]
    pub fn from_defaults(defaults: &SupervisorDefaults) -> Self {
        Self {
            shutdown_wait: defaults.shutdown_wait(),
            helper_process_name: defaults.helper_process_name.clone(),
            env: defaults
                .env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            cancel: CancellationToken::new(),
            ctrl_c_task: None,
        }
    }

    /// Create a context and install the process-wide Ctrl-C listener.
    ///
    /// The listener cancels this context's token, which every supervisor
    /// observing the context translates into graceful termination. Must be
    /// called from within a tokio runtime.
    #[must_use]
    pub fn init() -> Self {
        let mut ctx = Self::new();
        let cancel = ctx.cancel.clone();
        ctx.ctrl_c_task = Some(tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Ctrl-C received, cancelling supervised processes");
                cancel.cancel();
            }
        }));
        ctx
    }

    /// Override the shutdown wait.
    #[must_use]
    pub fn with_shutdown_wait(mut self, wait: Duration) -> Self {
        self.shutdown_wait = wait;
        self
    }

    /// Override the wrapper helper-process name.
    #[must_use]
    pub fn with_helper_process_name(mut self, name: impl Into<String>) -> Self {
        self.helper_process_name = name.into();
        self
    }

    /// Add an environment variable to the overlay, e.g. a display override.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// The wait at each shutdown escalation level.
    #[must_use]
    pub fn shutdown_wait(&self) -> Duration {
        self.shutdown_wait
    }

    /// The wrapper helper-process name.
    #[must_use]
    pub fn helper_process_name(&self) -> &str {
        &self.helper_process_name
    }

    /// The environment overlay applied to every launch.
    #[must_use]
    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    /// The cancellation token observed by supervisors using this context.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Tear the context down: cancel the token and stop the signal listener.
    pub fn teardown(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.ctrl_c_task.take() {
            task.abort();
        }
    }
}

impl Drop for RuntimeContext {
    fn drop(&mut self) {
        if let Some(task) = self.ctrl_c_task.take() {
            task.abort();
        }
    }
}
