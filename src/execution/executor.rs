//! Step executor - runs the commands of one step

use crate::{
    core::{RunContext, RunError, Step, StepKind, Variables},
    execution::{
        engine::ExecutionEvent,
        supervisor::{CommandRequest, CommandRunner},
    },
    persistence::EvidenceLog,
};
use tracing::{debug, info, warn};

/// Combined result of every command of a step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// Output of all commands, concatenated
    pub output: String,

    /// Exit code of the last command
    pub exit_code: i32,

    /// Any command exited non-zero
    pub failed: bool,

    /// Any command was killed by a timeout
    pub timed_out: bool,
}

/// Executes a single step
pub struct StepExecutor<R> {
    runner: R,
}

impl<R: CommandRunner> StepExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run every command of the step, then apply `save_output`.
    ///
    /// A failing command does not stop the ones after it; the step as a
    /// whole is marked failed instead.
    pub async fn execute(
        &self,
        step: &Step,
        vars: &mut Variables,
        log: &mut EvidenceLog,
        context: &RunContext,
        emit: &(dyn Fn(ExecutionEvent) + Sync),
    ) -> Result<StepOutcome, RunError> {
        if let StepKind::Unsupported(kind) = &step.kind {
            return Err(RunError::UnsupportedStepType {
                step: step.name.clone(),
                kind: kind.clone(),
            });
        }

        info!(step = %step.name, commands = step.commands.len(), "executing step");
        let silent = context.silent || step.silent;
        let mut outcome = StepOutcome::default();

        for command in &step.commands {
            let command_line = vars.interpolate(command);
            log.line(&format!("CMD: {}", command_line));
            emit(ExecutionEvent::CommandStarted {
                step: step.name.clone(),
                command: command_line.clone(),
                silent,
            });

            let request = CommandRequest {
                command_line: command_line.clone(),
                shell: context.shell.clone(),
                timeout: step.timeout,
                idle_timeout: step.idle_timeout,
            };
            let result = self.runner.run(&request, &context.cancel).await;
            debug!(
                step = %step.name,
                exit_code = result.exit_code,
                timed_out = result.timed_out,
                "command returned"
            );

            log.output(&result.output);
            outcome.output.push_str(&result.output);
            outcome.exit_code = result.exit_code;
            outcome.failed |= result.failed();
            outcome.timed_out |= result.timed_out;

            let failure = result.failed().then(|| {
                let reason = result
                    .error
                    .clone()
                    .unwrap_or_else(|| format!("exit status {}", result.exit_code));
                format!("command failed: {}", reason)
            });

            emit(ExecutionEvent::CommandFinished {
                step: step.name.clone(),
                command: command_line,
                result,
                silent,
            });

            if context.cancel.is_cancelled() {
                return Err(RunError::Cancelled);
            }

            if let Some(message) = failure {
                warn!(step = %step.name, "{}", message);
                log.line(&message);
                emit(ExecutionEvent::Diagnostic {
                    message,
                    critical: false,
                });
            }
        }

        if let Some(key) = &step.save_output {
            vars.set(key.clone(), outcome.output.trim());
        }

        Ok(outcome)
    }
}
