//! Core domain models for pipejob
//!
//! This module defines the pipeline, job and step structures, the branch
//! action union, configuration loading and the run-wide variable
//! environment.

pub mod condition;
pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod step;
pub mod variables;

pub use condition::*;
pub use context::*;
pub use error::{exit_code, RunError};
pub use pipeline::*;
pub use step::*;
pub use variables::Variables;
