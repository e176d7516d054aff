//! Working job list - decides which job runs next
//!
//! The list starts as the resolved execution order and only grows: a
//! `goto_job` may insert a declared job that was left out of the order, and
//! a jump from the middle of a job queues the rest of that job as a one-shot
//! resume job right after the jump target.

use crate::core::{Job, RunError, Step};
use std::sync::Arc;

/// Why a job is in the working list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOrigin {
    /// From the execution order, or inserted by a jump
    Declared,
    /// Remaining steps of an interrupted job
    Resume { of: String },
}

#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub job: Arc<Job>,
    pub origin: JobOrigin,
}

impl ScheduledJob {
    fn declared(job: Arc<Job>) -> Self {
        Self {
            job,
            origin: JobOrigin::Declared,
        }
    }
}

/// Cursor over the working job list
pub struct JobScheduler {
    queue: Vec<ScheduledJob>,
    declared: Vec<Arc<Job>>,
    cursor: usize,
    resume_seq: usize,
}

impl JobScheduler {
    /// `ordered` is the execution order, `declared` every job of the pipeline
    pub fn new(ordered: Vec<Job>, declared: &[Job]) -> Self {
        Self {
            queue: ordered
                .into_iter()
                .map(|job| ScheduledJob::declared(Arc::new(job)))
                .collect(),
            declared: declared.iter().cloned().map(Arc::new).collect(),
            cursor: 0,
            resume_seq: 0,
        }
    }

    /// Job under the cursor, `None` once the list is exhausted
    pub fn current(&self) -> Option<&ScheduledJob> {
        self.queue.get(self.cursor)
    }

    /// Move to the next job in the list
    pub fn advance(&mut self) {
        self.cursor += 1;
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Names in the working list, in order
    pub fn job_names(&self) -> Vec<&str> {
        self.queue.iter().map(|s| s.job.name.as_str()).collect()
    }

    /// Redirect execution to `target`.
    ///
    /// `remainder` holds the not-yet-run steps of the current job; when
    /// non-empty they are queued as a resume job right after the target.
    /// Afterwards `current()` is the target job.
    pub fn divert(&mut self, target: &str, remainder: Vec<Step>) -> Result<(), RunError> {
        let target_pos = match self.position(target) {
            Some(pos) => pos,
            None => {
                let job = self
                    .declared
                    .iter()
                    .find(|job| job.name == target)
                    .cloned()
                    .ok_or_else(|| RunError::MissingJob {
                        target: target.to_string(),
                    })?;
                let pos = (self.cursor + 1).min(self.queue.len());
                self.queue.insert(pos, ScheduledJob::declared(job));
                pos
            }
        };

        if !remainder.is_empty() {
            let interrupted = self
                .current()
                .map(|s| s.job.name.clone())
                .unwrap_or_default();
            self.resume_seq += 1;
            let resume = Job::new(
                format!("{}__resume_{}", interrupted, self.resume_seq),
                remainder,
            );
            self.queue.insert(
                target_pos + 1,
                ScheduledJob {
                    job: Arc::new(resume),
                    origin: JobOrigin::Resume { of: interrupted },
                },
            );
        }

        self.cursor = target_pos;
        Ok(())
    }

    /// First declared (non-resume) entry with this name
    fn position(&self, name: &str) -> Option<usize> {
        self.queue
            .iter()
            .position(|s| s.origin == JobOrigin::Declared && s.job.name == name)
    }
}
