//! Signal target resolution for wrapped launches.
//!
//! When the immediate child is a thin wrapper (a virtual-display launcher)
//! around the real workload, the wrapper is not guaranteed to forward signals
//! to its payload on every supported platform. The signaler recomputes the
//! target set at signal time: the wrapper's current children, minus the
//! wrapper's own helper process, each signalled directly.

/// Resolves which process IDs actually receive a signal.
#[derive(Debug, Clone)]
pub struct SubprocessGroupSignaler {
    wrapped: bool,
    helper_name: String,
}

impl SubprocessGroupSignaler {
    /// Signaler for a direct launch: the target set is the child itself.
    #[must_use]
    pub fn direct() -> Self {
        Self {
            wrapped: false,
            helper_name: String::new(),
        }
    }

    /// Signaler for a wrapped launch.
    ///
    /// `helper_name` is the wrapper's own helper process (e.g. `Xvfb`),
    /// excluded from the resolved target set.
    #[must_use]
    pub fn wrapped(helper_name: impl Into<String>) -> Self {
        Self {
            wrapped: true,
            helper_name: helper_name.into(),
        }
    }

    /// Whether this signaler walks the process tree at signal time.
    #[must_use]
    pub fn is_wrapped(&self) -> bool {
        self.wrapped
    }

    /// Compute the pids that must receive a signal for the child `root`.
    ///
    /// For a wrapped launch the set is recomputed from the wrapper's current
    /// children each call, since the payload may have been respawned. Lookup
    /// failures fall back to the wrapper pid itself.
    #[must_use]
    pub fn resolve_targets(&self, root: u32) -> Vec<u32> {
        if !self.wrapped {
            return vec![root];
        }

        let survivors: Vec<u32> = list_children(root)
            .into_iter()
            .filter(|&pid| {
                process_name(pid).is_none_or(|name| name != self.helper_name)
            })
            .collect();

        if survivors.is_empty() {
            // No enumerable payload; signal the wrapper and hope it forwards.
            vec![root]
        } else {
            survivors
        }
    }

    /// Send `signal` to every resolved target, best effort.
    ///
    /// Already-exited members and lookup failures are skipped silently.
    #[cfg(unix)]
    pub fn send(&self, root: u32, signal: nix::sys::signal::Signal) {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        for pid in self.resolve_targets(root) {
            let Ok(raw) = i32::try_from(pid) else {
                continue;
            };
            match kill(Pid::from_raw(raw), signal) {
                Ok(()) => {
                    tracing::debug!(pid, signal = %signal, "Delivered signal");
                }
                Err(errno) => {
                    tracing::debug!(pid, signal = %signal, %errno, "Signal skipped");
                }
            }
        }
    }
}

/// Enumerate the current children of `pid` from the kernel's view.
#[cfg(target_os = "linux")]
fn list_children(pid: u32) -> Vec<u32> {
    let task_dir = format!("/proc/{pid}/task");
    let Ok(entries) = std::fs::read_dir(&task_dir) else {
        return Vec::new();
    };

    let mut children = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path().join("children");
        let Ok(contents) = std::fs::read_to_string(&path) else {
            continue;
        };
        children.extend(
            contents
                .split_ascii_whitespace()
                .filter_map(|tok| tok.parse::<u32>().ok()),
        );
    }
    children
}

#[cfg(not(target_os = "linux"))]
fn list_children(_pid: u32) -> Vec<u32> {
    Vec::new()
}

/// The short process name (`comm`) of `pid`, if still alive.
#[cfg(target_os = "linux")]
fn process_name(pid: u32) -> Option<String> {
    std::fs::read_to_string(format!("/proc/{pid}/comm"))
        .ok()
        .map(|name| name.trim().to_string())
}

#[cfg(not(target_os = "linux"))]
fn process_name(_pid: u32) -> Option<String> {
    None
}
