//! Run error taxonomy and process exit codes

use crate::core::condition::RuleSource;
use thiserror::Error;

/// Process exit codes reported by the `pipejob` binary
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const USAGE: i32 = 2;
    pub const LIVE_MODE_REFUSED: i32 = 3;
    pub const UNSUPPORTED_STEP: i32 = 4;
    pub const UNMATCHED_FAILURE: i32 = 5;
    pub const INVALID_TARGET: i32 = 6;
    pub const EXPLICIT_FAIL: i32 = 7;
    pub const CANCELLED: i32 = 130;
}

/// Fatal conditions that end a pipeline run
#[derive(Debug, Error)]
pub enum RunError {
    #[error("{0}")]
    Usage(String),

    #[error("refusing to run pipeline with execution.mode=live in local runner")]
    LiveModeRefused,

    #[error("unsupported step type '{kind}' in step '{step}' - aborting")]
    UnsupportedStepType { step: String, kind: String },

    #[error("step {step} command(s) returned non-zero exit and no condition matched")]
    UnmatchedFailure { step: String },

    #[error("invalid {source_rule} regex '{pattern}' in step {step}: {error}")]
    InvalidRegex {
        step: String,
        source_rule: RuleSource,
        pattern: String,
        #[source]
        error: regex::Error,
    },

    #[error("{source_rule} in step {step}: {reason}")]
    InvalidBranch {
        step: String,
        source_rule: RuleSource,
        reason: String,
    },

    #[error("goto_step target '{target}' not found in job {job}")]
    MissingStep { job: String, target: String },

    #[error("goto_job target '{target}' not found")]
    MissingJob { target: String },

    #[error("runs lists unknown job '{0}' - aborting")]
    UnknownRunsJob(String),

    #[error("step {step} failed due to {source_rule} match")]
    ExplicitFail { step: String, source_rule: RuleSource },

    #[error("run cancelled")]
    Cancelled,
}

impl RunError {
    /// Exit code the binary reports for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Usage(_) => exit_code::USAGE,
            RunError::LiveModeRefused => exit_code::LIVE_MODE_REFUSED,
            RunError::UnsupportedStepType { .. } => exit_code::UNSUPPORTED_STEP,
            RunError::UnmatchedFailure { .. } => exit_code::UNMATCHED_FAILURE,
            RunError::InvalidRegex { .. }
            | RunError::InvalidBranch { .. }
            | RunError::MissingStep { .. }
            | RunError::MissingJob { .. }
            | RunError::UnknownRunsJob(_) => exit_code::INVALID_TARGET,
            RunError::ExplicitFail { .. } => exit_code::EXPLICIT_FAIL,
            RunError::Cancelled => exit_code::CANCELLED,
        }
    }
}
