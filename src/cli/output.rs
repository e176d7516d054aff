//! CLI output formatting

use crate::{
    core::{Pipeline, StepKind, Variables},
    execution::{ExecutionEvent, RunStatus},
};
use console::{Emoji, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Prints engine events to the console.
///
/// Job headers, command echo and command output go to stdout; diagnostics
/// and the spinner go to stderr.
pub struct ConsoleReporter {
    silent: bool,
    interactive: bool,
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleReporter {
    pub fn new(silent: bool) -> Self {
        Self {
            silent,
            interactive: Term::stderr().is_term(),
            spinner: Mutex::new(None),
        }
    }

    pub fn handle(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::PipelineStarted {
                run_id,
                pipeline_name,
            } => {
                if !self.silent {
                    println!(
                        "{}{} ({})",
                        ROCKET,
                        style(pipeline_name).bold(),
                        style(short_id(run_id)).dim()
                    );
                }
            }
            ExecutionEvent::JobStarted { job, .. } => {
                println!("{}", style(format!("== Job: {} ==", job)).bold());
            }
            ExecutionEvent::CommandStarted {
                command, silent, ..
            } => {
                if !silent {
                    println!("-> {}", command);
                    let _ = io::stdout().flush();
                    self.start_spinner(command);
                }
            }
            ExecutionEvent::CommandFinished { result, silent, .. } => {
                self.stop_spinner();
                if !silent && !result.output.is_empty() {
                    let mut stdout = io::stdout().lock();
                    let _ = stdout.write_all(result.output.as_bytes());
                    let _ = stdout.flush();
                }
            }
            ExecutionEvent::StepBranched { step, verdict, .. } => {
                if !self.silent {
                    println!(
                        "{}{}: {} matched, {}",
                        INFO,
                        style(step).cyan(),
                        verdict.source,
                        style(&verdict.action).yellow()
                    );
                }
            }
            ExecutionEvent::Diagnostic { message, critical } => {
                if *critical {
                    self.stop_spinner();
                    eprintln!("{}{}", CROSS, style(message).red());
                } else if !self.silent {
                    self.stop_spinner();
                    eprintln!("{}{}", WARN, style(message).yellow());
                }
            }
            ExecutionEvent::PipelineCompleted { .. } => self.stop_spinner(),
        }
    }

    fn start_spinner(&self, command: &str) {
        if !self.interactive {
            return;
        }
        let spinner = ProgressBar::new_spinner();
        if let Ok(template) = ProgressStyle::with_template("{spinner:.green} [{elapsed}] {msg}") {
            spinner.set_style(template);
        }
        spinner.set_message(fit_to_terminal(command, 16));
        spinner.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(previous) = slot.replace(spinner) {
                previous.finish_and_clear();
            }
        }
    }

    fn stop_spinner(&self) {
        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(spinner) = slot.take() {
                spinner.finish_and_clear();
            }
        }
    }
}

pub fn short_id(id: &Uuid) -> String {
    id.simple().to_string().chars().take(8).collect()
}

/// Truncate `text` to the stderr width minus `reserved` columns
pub fn fit_to_terminal(text: &str, reserved: usize) -> String {
    let width = term_size::dimensions_stderr()
        .map(|(w, _)| w)
        .unwrap_or(80);
    truncate(text, width.saturating_sub(reserved).max(8))
}

fn truncate(text: &str, max_chars: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() <= max_chars && line.len() == text.len() {
        return line.to_string();
    }
    let kept: String = line.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Commands a run would execute, per declared job
pub fn format_dry_run(pipeline: &Pipeline, vars: &Variables) -> String {
    let mut out = format!("Pipeline: {}\n", pipeline.name);
    for job in &pipeline.jobs {
        out.push_str(&format!("Job: {}\n", job.name));
        for step in &job.steps {
            if let StepKind::Unsupported(kind) = &step.kind {
                out.push_str(&format!(
                    "  step {}: unsupported step type '{}' (would abort)\n",
                    step.name, kind
                ));
                continue;
            }
            for command in &step.commands {
                out.push_str(&format!("  {}\n", vars.interpolate(command)));
            }
        }
    }
    out
}

/// Human summary for `validate`
pub fn format_validation(pipeline: &Pipeline, order: &[String]) -> String {
    format!(
        "{}Pipeline configuration is valid!\n  Name: {}\n  Jobs: {}\n  Steps: {}\n  Variables: {}\n  Order: {}",
        CHECK,
        style(&pipeline.name).bold(),
        style(pipeline.jobs.len()).cyan(),
        style(pipeline.step_count()).cyan(),
        style(pipeline.variables.len()).cyan(),
        order.join(" -> ")
    )
}

/// Machine-readable summary for `validate --json`
pub fn validation_json(pipeline: &Pipeline, order: &[String]) -> serde_json::Value {
    let jobs: Vec<_> = pipeline
        .jobs
        .iter()
        .map(|job| {
            let steps: Vec<_> = job
                .steps
                .iter()
                .map(|step| {
                    let kind = match &step.kind {
                        StepKind::Command => "command",
                        StepKind::Unsupported(kind) => kind.as_str(),
                    };
                    serde_json::json!({
                        "name": step.name,
                        "type": kind,
                        "commands": step.commands,
                    })
                })
                .collect();
            serde_json::json!({ "name": job.name, "steps": steps })
        })
        .collect();

    serde_json::json!({
        "name": pipeline.name,
        "order": order,
        "variables": pipeline.variables,
        "jobs": jobs,
    })
}

/// Final line of a run
pub fn format_completion(name: &str, status: RunStatus, log_dir: Option<&Path>) -> String {
    let logs = log_dir
        .map(|dir| format!(" (logs: {})", dir.display()))
        .unwrap_or_default();
    match status {
        RunStatus::Completed => format!(
            "{}{} completed {}{}",
            CHECK,
            style(name).bold(),
            style("successfully").green(),
            logs
        ),
        RunStatus::Dropped => format!(
            "{}{} stopped early by drop{}",
            INFO,
            style(name).bold(),
            logs
        ),
        RunStatus::Failed(code) => format!(
            "{}{} {} (exit {}){}",
            CROSS,
            style(name).bold(),
            style("failed").red(),
            code,
            logs
        ),
    }
}
