//! pipejob - a local runner for YAML-defined shell pipelines with branching

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;

// Re-export commonly used types
pub use core::{Action, Job, Pipeline, RunContext, RunError, Shell, Step, Variables};
pub use execution::{
    CommandRequest, CommandResult, CommandRunner, ExecutionEngine, ExecutionEvent, RunStatus,
    ShellSupervisor,
};
pub use persistence::EvidenceLog;
