//! Main execution engine - walks jobs and steps and applies branch decisions

use crate::{
    core::{Action, Pipeline, RunContext, RunError, Variables, Verdict},
    execution::{
        evaluator::evaluate,
        executor::StepExecutor,
        scheduler::{JobOrigin, JobScheduler},
        supervisor::{CommandResult, CommandRunner},
    },
    persistence::EvidenceLog,
};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every scheduled job finished
    Completed,
    /// A `drop` action stopped the run early
    Dropped,
    /// The run aborted with this exit code
    Failed(i32),
}

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        run_id: Uuid,
        pipeline_name: String,
    },
    JobStarted {
        job: String,
        resumed: bool,
    },
    CommandStarted {
        step: String,
        command: String,
        silent: bool,
    },
    CommandFinished {
        step: String,
        command: String,
        result: CommandResult,
        silent: bool,
    },
    StepBranched {
        job: String,
        step: String,
        verdict: Verdict,
    },
    Diagnostic {
        message: String,
        critical: bool,
    },
    PipelineCompleted {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Main pipeline execution engine
pub struct ExecutionEngine<R> {
    executor: StepExecutor<R>,
    context: RunContext,
    event_handlers: Vec<EventHandler>,
}

impl<R: CommandRunner> ExecutionEngine<R> {
    pub fn new(runner: R, context: RunContext) -> Self {
        Self {
            executor: StepExecutor::new(runner),
            context,
            event_handlers: Vec::new(),
        }
    }

    pub fn runner(&self) -> &R {
        self.executor.runner()
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    fn emit(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    /// Execute the entire pipeline.
    ///
    /// `Ok` is a successful run, either completed or dropped. Every fatal
    /// condition is an `Err` carrying its exit code.
    pub async fn execute(
        &self,
        pipeline: &Pipeline,
        vars: &mut Variables,
        log: &mut EvidenceLog,
    ) -> Result<RunStatus, RunError> {
        let run_id = log.run_id();
        info!(pipeline = %pipeline.name, %run_id, "starting pipeline execution");
        self.emit(ExecutionEvent::PipelineStarted {
            run_id,
            pipeline_name: pipeline.name.clone(),
        });

        let result = self.run_jobs(pipeline, vars, log).await;

        let status = match &result {
            Ok(status) => {
                log.line(match status {
                    RunStatus::Dropped => "run dropped",
                    _ => "completed",
                });
                *status
            }
            Err(e) => {
                let message = e.to_string();
                error!(code = e.exit_code(), "{}", message);
                log.line(&message);
                self.emit(ExecutionEvent::Diagnostic {
                    message,
                    critical: true,
                });
                RunStatus::Failed(e.exit_code())
            }
        };

        self.emit(ExecutionEvent::PipelineCompleted { run_id, status });
        result
    }

    async fn run_jobs(
        &self,
        pipeline: &Pipeline,
        vars: &mut Variables,
        log: &mut EvidenceLog,
    ) -> Result<RunStatus, RunError> {
        let mut scheduler = JobScheduler::new(pipeline.ordered_jobs()?, &pipeline.jobs);
        let emit = |event: ExecutionEvent| self.emit(event);

        'jobs: while let Some(scheduled) = scheduler.current().cloned() {
            let job = scheduled.job;
            log.line(&format!("== Job: {} ==", job.name));
            self.emit(ExecutionEvent::JobStarted {
                job: job.name.clone(),
                resumed: matches!(scheduled.origin, JobOrigin::Resume { .. }),
            });
            debug!(job = %job.name, steps = job.steps.len(), "job started");

            let mut index = 0;
            while let Some(step) = job.steps.get(index) {
                if self.context.cancel.is_cancelled() {
                    return Err(RunError::Cancelled);
                }

                let outcome = self
                    .executor
                    .execute(step, vars, log, &self.context, &emit)
                    .await?;

                let Some(verdict) = evaluate(step, &outcome, vars)? else {
                    if outcome.failed {
                        return Err(RunError::UnmatchedFailure {
                            step: step.name.clone(),
                        });
                    }
                    index += 1;
                    continue;
                };

                info!(
                    job = %job.name,
                    step = %step.name,
                    action = %verdict.action,
                    "{} matched",
                    verdict.source
                );
                log.line(&format!("{} matched: {}", verdict.source, verdict.action));
                self.emit(ExecutionEvent::StepBranched {
                    job: job.name.clone(),
                    step: step.name.clone(),
                    verdict: verdict.clone(),
                });

                match verdict.action {
                    Action::Continue => index += 1,
                    Action::Drop => return Ok(RunStatus::Dropped),
                    Action::Fail => {
                        return Err(RunError::ExplicitFail {
                            step: step.name.clone(),
                            source_rule: verdict.source,
                        })
                    }
                    Action::GotoStep(target) => {
                        index = job.step_index(&target).ok_or_else(|| RunError::MissingStep {
                            job: job.name.clone(),
                            target,
                        })?;
                    }
                    Action::GotoJob(target) => {
                        let remainder = job.steps[index + 1..].to_vec();
                        scheduler.divert(&target, remainder)?;
                        continue 'jobs;
                    }
                }
            }

            scheduler.advance();
        }

        Ok(RunStatus::Completed)
    }
}
