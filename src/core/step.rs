//! Step domain model

use crate::core::{
    condition::{Action, PatternCondition, RuleSource, WhenRule, WhenTest},
    config::{parse_duration, StepConfig, WhenTestConfig},
    error::RunError,
};
use std::time::Duration;

/// What a step runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    /// Shell command(s); the only runnable kind
    Command,
    /// Any other declared type; aborts the run when reached
    Unsupported(String),
}

impl StepKind {
    fn from_type(kind: &str) -> Self {
        if kind.is_empty() || kind.eq_ignore_ascii_case("command") {
            StepKind::Command
        } else {
            StepKind::Unsupported(kind.to_string())
        }
    }
}

/// A single step in a job
#[derive(Debug, Clone)]
pub struct Step {
    /// Step name, unique within its job only
    pub name: String,

    pub kind: StepKind,

    /// Command lines, run in order (not yet interpolated)
    pub commands: Vec<String>,

    /// Variable receiving the trimmed combined output
    pub save_output: Option<String>,

    /// Suppress echo and output of this step's commands
    pub silent: bool,

    /// Total timeout per command
    pub timeout: Option<Duration>,

    /// Maximum silence per command
    pub idle_timeout: Option<Duration>,

    /// Legacy regex conditions
    pub conditions: Vec<PatternCondition>,

    /// Operator rules
    pub when: Vec<WhenRule>,

    /// `else_action` branch
    pub otherwise: Option<Action>,

    /// `on_timeout` shortcut
    pub on_timeout: Option<Action>,
}

impl Step {
    /// Create a step from a step config, validating every branch action
    pub fn from_config(config: &StepConfig) -> Result<Self, RunError> {
        let name = config.name.clone();
        let invalid = |source_rule: RuleSource, reason: String| RunError::InvalidBranch {
            step: name.clone(),
            source_rule,
            reason,
        };

        let commands = if !config.commands.is_empty() {
            config.commands.clone()
        } else if !config.command.is_empty() {
            vec![config.command.clone()]
        } else {
            Vec::new()
        };

        let conditions = config
            .conditions
            .iter()
            .enumerate()
            .map(|(i, c)| {
                Action::parse(
                    &c.action,
                    Some(c.step.as_str()),
                    Some(c.job.as_str()),
                    "step",
                    "job",
                )
                .map(|action| PatternCondition {
                    pattern: c.pattern.clone(),
                    action,
                })
                .map_err(|reason| invalid(RuleSource::Condition(i), reason))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let when = config
            .when
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let action = Action::parse(
                    &w.action,
                    Some(w.step.as_str()),
                    Some(w.job.as_str()),
                    "step",
                    "job",
                )
                .map_err(|reason| invalid(RuleSource::When(i), reason))?;
                Ok(WhenRule {
                    test: when_test(&w.contains, &w.equals, &w.regex, w.exit_code),
                    all: w.all.iter().map(WhenTest::from).collect(),
                    any: w.any.iter().map(WhenTest::from).collect(),
                    action,
                })
            })
            .collect::<Result<Vec<_>, RunError>>()?;

        let otherwise = optional_action(
            &config.else_action,
            &config.else_step,
            &config.else_job,
            ("else_step", "else_job"),
        )
        .map_err(|reason| invalid(RuleSource::Else, reason))?;

        let on_timeout = optional_action(
            &config.on_timeout,
            &config.on_timeout_step,
            &config.on_timeout_job,
            ("on_timeout_step", "on_timeout_job"),
        )
        .map_err(|reason| invalid(RuleSource::Timeout, reason))?;

        Ok(Step {
            kind: StepKind::from_type(&config.kind),
            commands,
            save_output: non_empty(&config.save_output),
            silent: config.silent,
            timeout: step_duration(&name, "timeout", &config.timeout)?,
            idle_timeout: step_duration(&name, "idle_timeout", &config.idle_timeout)?,
            conditions,
            when,
            otherwise,
            on_timeout,
            name,
        })
    }
}

impl From<&WhenTestConfig> for WhenTest {
    fn from(config: &WhenTestConfig) -> Self {
        when_test(&config.contains, &config.equals, &config.regex, config.exit_code)
    }
}

fn when_test(contains: &str, equals: &str, regex: &str, exit_code: Option<i32>) -> WhenTest {
    WhenTest {
        contains: non_empty(contains),
        equals: non_empty(equals),
        regex: non_empty(regex),
        exit_code,
    }
}

fn optional_action(
    keyword: &str,
    step: &str,
    job: &str,
    fields: (&str, &str),
) -> Result<Option<Action>, String> {
    if keyword.is_empty() {
        return Ok(None);
    }
    Action::parse(keyword, Some(step), Some(job), fields.0, fields.1).map(Some)
}

fn step_duration(step: &str, field: &str, value: &str) -> Result<Option<Duration>, RunError> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    let duration = parse_duration(value).map_err(|reason| {
        RunError::Usage(format!("step {}: invalid {}: {}", step, field, reason))
    })?;
    Ok(Some(duration).filter(|d| !d.is_zero()))
}

fn non_empty(value: &str) -> Option<String> {
    Some(value.to_string()).filter(|v| !v.is_empty())
}
