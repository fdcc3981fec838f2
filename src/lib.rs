//! Concurrent subprocess supervisor with a streaming output-handling pipeline.
//!
//! Every build step, test runner, browser launch, symbol extractor, and
//! debugger-attach flow in a build/test orchestration stack funnels through one
//! [`supervisor::ProcessSupervisor`]: it multiplexes non-blocking reads of the
//! child's stdout and stderr, enforces independent total and output-idle
//! deadlines, escalates shutdown from a graceful to a forceful signal, and
//! feeds every completed line through a composable [`handler::OutputHandler`]
//! chain that may request early completion or rewrite the final exit status.

pub mod config;
pub mod context;
pub mod handler;
pub mod process;
pub mod supervisor;
