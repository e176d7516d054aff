//! Pipeline configuration from YAML
//!
//! Field names mirror the YAML schema exactly. Empty strings mean "not set",
//! the same as an absent key.

use crate::core::error::RunError;
use crate::core::Pipeline;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Root document: everything lives under the `pipeline` key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineFile {
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Top-level pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    #[serde(default)]
    pub name: String,

    /// Explicit job execution order (declaration order when empty)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runs: Vec<String>,

    /// Initial variables
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    variables: BTreeMap<String, Value>,

    /// Job definitions
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

/// Job configuration as defined in YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepConfig {
    #[serde(default)]
    pub name: String,

    /// Step type; only `command` (or empty) is runnable
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,

    /// Takes precedence over `command` when non-empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,

    /// Variable that receives the trimmed output
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub save_output: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub silent: bool,

    /// Total timeout, Go duration syntax (`30s`, `1m30s`)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub timeout: String,

    /// Maximum silence on stdout/stderr before the command is killed
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub idle_timeout: String,

    /// Legacy regex conditions, evaluated first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ConditionConfig>,

    /// Operator rules, evaluated when no legacy condition matched
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub when: Vec<WhenConfig>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub else_action: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub else_step: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub else_job: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub on_timeout: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub on_timeout_step: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub on_timeout_job: String,
}

/// Legacy `conditions` entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConditionConfig {
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub step: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub job: String,
}

/// `when` rule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhenConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub contains: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub equals: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub regex: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Every entry must match
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all: Vec<WhenTestConfig>,

    /// At least one entry must match
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any: Vec<WhenTestConfig>,

    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub step: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub job: String,
}

/// Operator set inside a `when` group
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhenTestConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub contains: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub equals: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub regex: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl PipelineFile {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("failed to load pipeline {}", path.display()))
    }

    /// Parse pipeline configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        check_execution_mode(yaml)?;
        let file: PipelineFile = serde_yaml::from_str(yaml).context("failed to parse yaml")?;
        Ok(file)
    }

    /// Minimal pipeline written by `pipejob new`
    pub fn scaffold(name: &str) -> Self {
        let mut variables = BTreeMap::new();
        variables.insert("EXAMPLE".to_string(), Value::String("value".to_string()));

        PipelineFile {
            pipeline: PipelineConfig {
                name: name.to_string(),
                runs: Vec::new(),
                variables,
                jobs: vec![JobConfig {
                    name: "job1".to_string(),
                    steps: vec![StepConfig {
                        name: "step1".to_string(),
                        kind: "command".to_string(),
                        command: "echo 'hello world'".to_string(),
                        ..Default::default()
                    }],
                }],
            },
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("failed to marshal pipeline yaml")
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Result<Pipeline, RunError> {
        Pipeline::from_config(&self.pipeline)
    }
}

impl PipelineConfig {
    /// Variables rendered as strings; non-string scalars use their YAML text
    pub fn variables_as_string_map(&self) -> BTreeMap<String, String> {
        self.variables
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    Value::Bool(b) => b.to_string(),
                    Value::Number(n) => n.to_string(),
                    Value::Null => String::new(),
                    other => serde_yaml::to_string(other)
                        .map(|s| s.trim_end().to_string())
                        .unwrap_or_default(),
                };
                (key.clone(), rendered)
            })
            .collect()
    }
}

/// Refuse documents that declare `execution.mode: live`.
///
/// Runs on the raw document so it applies even when the typed parse would
/// fail later.
pub fn check_execution_mode(yaml: &str) -> Result<(), RunError> {
    let Ok(root) = serde_yaml::from_str::<Value>(yaml) else {
        return Ok(());
    };

    let mode = root
        .get("execution")
        .and_then(|execution| execution.get("mode"))
        .and_then(Value::as_str);

    match mode {
        Some(mode) if mode.eq_ignore_ascii_case("live") => Err(RunError::LiveModeRefused),
        _ => Ok(()),
    }
}

/// Parse a Go-style duration string such as `30s`, `1m30s`, `1.5h` or `250ms`
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let text = input.trim();
    if text == "0" {
        return Ok(Duration::ZERO);
    }
    if text.is_empty() {
        return Err("empty duration".to_string());
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut rest = text;
    let mut seconds = 0f64;

    while !rest.is_empty() {
        let number_end = rest.find(|c: char| !is_number(c)).unwrap_or(rest.len());
        if number_end == 0 {
            return Err(format!("invalid duration '{}'", input));
        }
        let value: f64 = rest[..number_end]
            .parse()
            .map_err(|_| format!("invalid duration '{}'", input))?;
        rest = &rest[number_end..];

        let unit_end = rest.find(is_number).unwrap_or(rest.len());
        let scale = match &rest[..unit_end] {
            "ns" => 1e-9,
            "us" | "µs" | "μs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            "" => return Err(format!("missing unit in duration '{}'", input)),
            unit => return Err(format!("unknown unit '{}' in duration '{}'", unit, input)),
        };
        seconds += value * scale;
        rest = &rest[unit_end..];
    }

    Ok(Duration::from_secs_f64(seconds))
}
