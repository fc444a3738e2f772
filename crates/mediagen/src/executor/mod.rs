//! Workflow executor: turns a prompt into an engine command line and runs
//! it as a subprocess with a timeout.

pub mod args;
pub mod runner;

pub use args::{ArgumentBuilder, Invocation};
pub use runner::{ExecutionOutcome, WorkflowExecutor};
