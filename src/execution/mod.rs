//! Pipeline execution engine

pub mod engine;
pub mod evaluator;
pub mod executor;
pub mod process;
pub mod scheduler;
pub mod supervisor;

pub use engine::{EventHandler, ExecutionEngine, ExecutionEvent, RunStatus};
pub use evaluator::evaluate;
pub use executor::{StepExecutor, StepOutcome};
pub use scheduler::{JobOrigin, JobScheduler, ScheduledJob};
pub use supervisor::{
    CommandRequest, CommandResult, CommandRunner, ShellSupervisor, TIMEOUT_EXIT_CODE,
};
