//! Scenario tests for pipeline control flow

mod helpers;

mod evaluation;
mod job_jumps;
#[cfg(unix)]
mod processes;
