//! Pipeline and job domain model

use crate::core::{config::PipelineConfig, error::RunError, step::Step};
use std::collections::BTreeMap;

/// A named, ordered group of steps
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Job {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Job {
            name: name.into(),
            steps,
        }
    }

    /// Position of the first step with this name
    pub fn step_index(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.name == name)
    }
}

/// A pipeline definition
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Explicit execution order; declaration order when `None`
    pub runs: Option<Vec<String>>,

    /// Initial variables
    pub variables: BTreeMap<String, String>,

    /// Jobs in declaration order
    pub jobs: Vec<Job>,
}

impl Pipeline {
    /// Create a pipeline from configuration
    pub fn from_config(config: &PipelineConfig) -> Result<Self, RunError> {
        let jobs = config
            .jobs
            .iter()
            .map(|job| {
                let steps = job
                    .steps
                    .iter()
                    .map(Step::from_config)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Job::new(job.name.clone(), steps))
            })
            .collect::<Result<Vec<_>, RunError>>()?;

        Ok(Pipeline {
            name: config.name.clone(),
            runs: Some(config.runs.clone()).filter(|runs| !runs.is_empty()),
            variables: config.variables_as_string_map(),
            jobs,
        })
    }

    /// Get a declared job by name
    pub fn job(&self, name: &str) -> Option<&Job> {
        self.jobs.iter().find(|job| job.name == name)
    }

    /// Jobs in execution order.
    ///
    /// Follows `runs` when given, which may repeat or omit jobs; otherwise
    /// declaration order.
    pub fn ordered_jobs(&self) -> Result<Vec<Job>, RunError> {
        match &self.runs {
            None => Ok(self.jobs.clone()),
            Some(runs) => runs
                .iter()
                .map(|name| {
                    self.job(name)
                        .cloned()
                        .ok_or_else(|| RunError::UnknownRunsJob(name.clone()))
                })
                .collect(),
        }
    }

    pub fn step_count(&self) -> usize {
        self.jobs.iter().map(|job| job.steps.len()).sum()
    }
}
