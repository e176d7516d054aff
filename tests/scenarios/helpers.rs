//! Test helpers for pipeline scenario tests

use async_trait::async_trait;
use pipejob::core::config::PipelineFile;
use pipejob::core::RuleSource;
use pipejob::execution::CommandRequest;
use pipejob::{
    CommandResult, CommandRunner, EvidenceLog, ExecutionEngine, ExecutionEvent, Pipeline,
    RunContext, RunError, RunStatus, Variables,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Stand-in shell.
///
/// Scripted command lines answer from their queue (the last answer
/// repeats). Anything else behaves like a tiny shell: `echo <text>` prints
/// the text, `exit <n>` exits with `n`, everything else succeeds silently.
#[derive(Default)]
pub struct MockRunner {
    script: Mutex<HashMap<String, VecDeque<CommandResult>>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an answer for an exact command line
    pub fn respond(self, command_line: &str, result: CommandResult) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(command_line.to_string())
            .or_default()
            .push_back(result);
        self
    }

    fn scripted(&self, command_line: &str) -> Option<CommandResult> {
        let mut script = self.script.lock().unwrap();
        let queue = script.get_mut(command_line)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, request: &CommandRequest, _cancel: &CancellationToken) -> CommandResult {
        let line = request.command_line.as_str();
        if let Some(result) = self.scripted(line) {
            return result;
        }
        if let Some(text) = line.strip_prefix("echo ") {
            let text = text.trim_matches(|c| c == '"' || c == '\'');
            return CommandResult::success(format!("{}\n", text));
        }
        if let Some(code) = line.strip_prefix("exit ") {
            return CommandResult::exited("", code.trim().parse().unwrap_or(1));
        }
        CommandResult::success("")
    }
}

/// Everything observable about one run
#[derive(Debug)]
pub struct PipelineTestResult {
    pub result: Result<RunStatus, RunError>,
    pub commands: Vec<String>,
    pub events: Vec<ExecutionEvent>,
    pub vars: Variables,
    pub log: String,
}

impl PipelineTestResult {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Exit code the binary would report
    pub fn exit_code(&self) -> i32 {
        match &self.result {
            Ok(_) => 0,
            Err(e) => e.exit_code(),
        }
    }

    /// Job names in the order they started, resume jobs included
    pub fn jobs_started(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ExecutionEvent::JobStarted { job, .. } => Some(job.clone()),
                _ => None,
            })
            .collect()
    }

    /// (step, rule) for every branch taken
    pub fn branches(&self) -> Vec<(String, RuleSource)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ExecutionEvent::StepBranched { step, verdict, .. } => {
                    Some((step.clone(), verdict.source))
                }
                _ => None,
            })
            .collect()
    }

    /// Captured output of every command, concatenated
    pub fn output(&self) -> String {
        self.events
            .iter()
            .filter_map(|event| match event {
                ExecutionEvent::CommandFinished { result, .. } => Some(result.output.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Result of the first command with this exact line
    pub fn command_result(&self, command_line: &str) -> Option<&CommandResult> {
        self.events.iter().find_map(|event| match event {
            ExecutionEvent::CommandFinished {
                command, result, ..
            } if command == command_line => Some(result),
            _ => None,
        })
    }

    pub fn summary(&self) -> String {
        let status = match &self.result {
            Ok(status) => format!("{:?}", status),
            Err(e) => format!("error (exit {}): {}", e.exit_code(), e),
        };
        format!(
            "{} - {} commands, jobs {:?}",
            status,
            self.commands.len(),
            self.jobs_started()
        )
    }
}

/// Parse a pipeline from YAML string
pub fn pipeline_from_yaml(yaml: &str) -> Pipeline {
    PipelineFile::from_yaml(yaml)
        .unwrap_or_else(|e| panic!("Failed to parse pipeline YAML: {:#}", e))
        .to_pipeline()
        .unwrap_or_else(|e| panic!("Failed to build pipeline: {}", e))
}

/// Run a pipeline against the mock shell
pub async fn run_pipeline_with_mock(yaml: &str, runner: MockRunner) -> PipelineTestResult {
    run_pipeline_with_runner(yaml, runner).await
}

/// Run a pipeline against real child processes
#[cfg(unix)]
pub async fn run_pipeline_with_shell(yaml: &str) -> PipelineTestResult {
    run_pipeline_with_runner(yaml, pipejob::ShellSupervisor::new()).await
}

/// Run a pipeline with any runner, seeding variables from the pipeline
pub async fn run_pipeline_with_runner<R: CommandRunner>(
    yaml: &str,
    runner: R,
) -> PipelineTestResult {
    let pipeline = pipeline_from_yaml(yaml);
    let mut vars: Variables = pipeline.variables.clone().into_iter().collect();
    let mut log = EvidenceLog::new(&pipeline.name, Uuid::new_v4());

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let mut engine = ExecutionEngine::new(runner, RunContext::new());
    engine.add_event_handler(move |event| sink.lock().unwrap().push(event));

    let result = engine.execute(&pipeline, &mut vars, &mut log).await;
    let events = events.lock().unwrap().clone();
    let commands = events
        .iter()
        .filter_map(|event| match event {
            ExecutionEvent::CommandStarted { command, .. } => Some(command.clone()),
            _ => None,
        })
        .collect();

    PipelineTestResult {
        result,
        commands,
        events,
        vars,
        log: String::from_utf8_lossy(log.buffered()).into_owned(),
    }
}

/// Assert pipeline completed successfully
pub fn assert_pipeline_completed(result: &PipelineTestResult) {
    assert!(
        matches!(result.result, Ok(RunStatus::Completed)),
        "Pipeline should be completed, but was: {}",
        result.summary()
    );
}

/// Assert pipeline aborted with this exit code
pub fn assert_exit_code(result: &PipelineTestResult, expected: i32) {
    assert_eq!(
        result.exit_code(),
        expected,
        "Unexpected exit code: {}",
        result.summary()
    );
}

/// Assert the exact sequence of command lines that ran
pub fn assert_commands(result: &PipelineTestResult, expected: &[&str]) {
    assert_eq!(
        result.commands, expected,
        "Expected commands: {:?}\nActual: {:?}",
        expected, result.commands
    );
}

/// Assert the order jobs started in
pub fn assert_job_order(result: &PipelineTestResult, expected: &[&str]) {
    assert_eq!(
        result.jobs_started(),
        expected,
        "Expected job order: {:?}\nActual: {:?}",
        expected,
        result.jobs_started()
    );
}

/// How many times a command line ran
pub fn count_runs(result: &PipelineTestResult, command_line: &str) -> usize {
    result
        .commands
        .iter()
        .filter(|c| c.as_str() == command_line)
        .count()
}
