//! Branch evaluation
//!
//! Rule sets are tried in a fixed order: legacy conditions, `when` rules,
//! `else_action`, then `on_timeout`. The first stage that produces a
//! decision ends evaluation.

use crate::core::{RuleSource, RunError, Step, Variables, Verdict, WhenRule, WhenTest};
use crate::execution::executor::StepOutcome;
use regex::Regex;

/// Decide what happens after a step. `None` means no rule applied.
pub fn evaluate(
    step: &Step,
    outcome: &StepOutcome,
    vars: &Variables,
) -> Result<Option<Verdict>, RunError> {
    for (i, condition) in step.conditions.iter().enumerate() {
        let source = RuleSource::Condition(i);
        let pattern = vars.interpolate(&condition.pattern);
        if compile(step, source, pattern)?.is_match(&outcome.output) {
            return Ok(Some(Verdict {
                action: condition.action.clone(),
                source,
            }));
        }
    }

    for (i, rule) in step.when.iter().enumerate() {
        let source = RuleSource::When(i);
        if rule_matches(step, source, rule, outcome, vars)? {
            return Ok(Some(Verdict {
                action: rule.action.clone(),
                source,
            }));
        }
    }

    if let Some(action) = &step.otherwise {
        return Ok(Some(Verdict {
            action: action.clone(),
            source: RuleSource::Else,
        }));
    }

    if outcome.timed_out {
        if let Some(action) = &step.on_timeout {
            return Ok(Some(Verdict {
                action: action.clone(),
                source: RuleSource::Timeout,
            }));
        }
    }

    Ok(None)
}

fn rule_matches(
    step: &Step,
    source: RuleSource,
    rule: &WhenRule,
    outcome: &StepOutcome,
    vars: &Variables,
) -> Result<bool, RunError> {
    if test_matches(step, source, &rule.test, outcome, vars)? {
        return Ok(true);
    }

    if !rule.all.is_empty() {
        let mut all = true;
        for test in &rule.all {
            if !test_matches(step, source, test, outcome, vars)? {
                all = false;
                break;
            }
        }
        if all {
            return Ok(true);
        }
    }

    for test in &rule.any {
        if test_matches(step, source, test, outcome, vars)? {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Operators are tried in order; later ones only run if earlier ones failed
fn test_matches(
    step: &Step,
    source: RuleSource,
    test: &WhenTest,
    outcome: &StepOutcome,
    vars: &Variables,
) -> Result<bool, RunError> {
    if let Some(needle) = &test.contains {
        if outcome.output.contains(&vars.interpolate(needle)) {
            return Ok(true);
        }
    }

    if let Some(expected) = &test.equals {
        if outcome.output.trim() == vars.interpolate(expected).trim() {
            return Ok(true);
        }
    }

    if let Some(pattern) = &test.regex {
        if compile(step, source, vars.interpolate(pattern))?.is_match(&outcome.output) {
            return Ok(true);
        }
    }

    Ok(test.exit_code == Some(outcome.exit_code))
}

fn compile(step: &Step, source: RuleSource, pattern: String) -> Result<Regex, RunError> {
    Regex::new(&pattern).map_err(|error| RunError::InvalidRegex {
        step: step.name.clone(),
        source_rule: source,
        pattern,
        error,
    })
}
