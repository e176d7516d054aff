//! CLI command definitions

use crate::core::variables::parse_key_value;
use clap::Args;
use std::path::PathBuf;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    pub file: PathBuf,

    /// Variable override (key=val), repeatable; wins over every other source
    #[arg(long = "var", value_name = "KEY=VAL", value_parser = parse_key_value)]
    pub vars: Vec<(String, String)>,

    /// Optional .env file layered over the pipeline variables
    #[arg(long, default_value = ".env")]
    pub env_file: PathBuf,

    /// Print the interpolated commands without running anything
    #[arg(long)]
    pub dry_run: bool,

    /// Stream the run log into this directory and keep it
    #[arg(long, value_name = "DIR")]
    pub persist_logs: Option<PathBuf>,

    /// Shell for every command (sh, bash, cmd, powershell or a path)
    #[arg(long)]
    pub shell: Option<String>,

    /// Suppress command echo and output
    #[arg(long)]
    pub silent: bool,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Write a starter pipeline
#[derive(Debug, Args, Clone)]
pub struct NewCommand {
    /// Where to write the YAML
    pub output: PathBuf,

    /// Pipeline name
    #[arg(long, default_value = "generated")]
    pub name: String,
}
