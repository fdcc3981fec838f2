//! Child process launch and signal delivery.

mod launch;
mod signaler;

pub use launch::{LaunchConfig, LaunchError, ProcessHandle};
pub use signaler::SubprocessGroupSignaler;
