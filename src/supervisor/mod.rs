//! The process supervisor: multiplexed output pump and termination state machine.

mod control;
mod deadline;
mod pump;
mod reader;
mod state;

pub use control::SupervisorControl;
pub use deadline::DeadlineSet;
pub use pump::{ProcessSupervisor, SupervisorError, UNRESPONSIVE_STATUS};
pub use reader::{StreamKind, StreamReader};
pub use state::TerminationState;
