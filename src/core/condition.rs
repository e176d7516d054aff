//! Branch actions and the rules that select them

use std::fmt;

/// What the interpreter does after a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Proceed to the next step
    Continue,
    /// Stop the whole run, reporting success
    Drop,
    /// Jump to a step of the current job
    GotoStep(String),
    /// Detour through another job, then resume the current one
    GotoJob(String),
    /// Stop the whole run, reporting failure
    Fail,
}

impl Action {
    /// Build an action from its YAML keyword and companion target fields.
    ///
    /// `step_field` / `job_field` name the YAML keys used in error messages,
    /// since the else and on_timeout branches use prefixed keys.
    pub fn parse(
        keyword: &str,
        step: Option<&str>,
        job: Option<&str>,
        step_field: &str,
        job_field: &str,
    ) -> Result<Self, String> {
        let target = |value: Option<&str>| value.filter(|v| !v.is_empty()).map(str::to_string);

        match keyword {
            "continue" => Ok(Action::Continue),
            "drop" => Ok(Action::Drop),
            "fail" => Ok(Action::Fail),
            "goto_step" => target(step)
                .map(Action::GotoStep)
                .ok_or_else(|| format!("goto_step requires '{}'", step_field)),
            "goto_job" => target(job)
                .map(Action::GotoJob)
                .ok_or_else(|| format!("goto_job requires '{}'", job_field)),
            other => Err(format!("unknown action '{}'", other)),
        }
    }

    /// Keyword as written in YAML
    pub fn keyword(&self) -> &'static str {
        match self {
            Action::Continue => "continue",
            Action::Drop => "drop",
            Action::GotoStep(_) => "goto_step",
            Action::GotoJob(_) => "goto_job",
            Action::Fail => "fail",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::GotoStep(target) | Action::GotoJob(target) => {
                write!(f, "{} {}", self.keyword(), target)
            }
            _ => f.write_str(self.keyword()),
        }
    }
}

/// Which rule set produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSource {
    /// Legacy `conditions[i]`
    Condition(usize),
    /// `when[i]`
    When(usize),
    /// `else_action`
    Else,
    /// `on_timeout`
    Timeout,
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSource::Condition(_) => f.write_str("condition"),
            RuleSource::When(_) => f.write_str("when"),
            RuleSource::Else => f.write_str("else_action"),
            RuleSource::Timeout => f.write_str("on_timeout"),
        }
    }
}

/// Legacy `conditions` entry: a regex over the step output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternCondition {
    pub pattern: String,
    pub action: Action,
}

/// One set of `when` operators.
///
/// Operators are tried in a fixed order: contains, equals, regex, exit_code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhenTest {
    pub contains: Option<String>,
    pub equals: Option<String>,
    pub regex: Option<String>,
    pub exit_code: Option<i32>,
}

impl WhenTest {
    pub fn is_empty(&self) -> bool {
        self.contains.is_none()
            && self.equals.is_none()
            && self.regex.is_none()
            && self.exit_code.is_none()
    }
}

/// A `when` rule with optional `all` / `any` groups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhenRule {
    pub test: WhenTest,
    pub all: Vec<WhenTest>,
    pub any: Vec<WhenTest>,
    pub action: Action,
}

/// A branch decision together with the rule that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub action: Action,
    pub source: RuleSource,
}
