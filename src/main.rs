use anyhow::{Context, Result};
use pipejob::cli::commands::{NewCommand, RunCommand, ValidateCommand};
use pipejob::cli::output::*;
use pipejob::cli::{Cli, Command};
use pipejob::core::config::PipelineFile;
use pipejob::core::variables::parse_env_file;
use pipejob::core::{exit_code, Pipeline, RunContext, RunError, Shell, Variables};
use pipejob::execution::{ExecutionEngine, ShellSupervisor};
use pipejob::persistence::EvidenceLog;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() {
    let cli = Cli::from_args();
    init_logging(cli.verbose);

    let code = match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await,
        Command::Validate(cmd) => validate_pipeline(cmd),
        Command::New(cmd) => new_pipeline(cmd),
    };

    std::process::exit(code);
}

/// `--verbose` forces debug; otherwise `RUST_LOG`, defaulting to warn
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Print a load/setup error and pick its exit code
fn report(err: &anyhow::Error) -> i32 {
    eprintln!("{}{}", CROSS, style(format!("{:#}", err)).red());
    err.downcast_ref::<RunError>()
        .map(RunError::exit_code)
        .unwrap_or(exit_code::USAGE)
}

fn load(path: &Path) -> Result<Pipeline> {
    let file = PipelineFile::from_file(path)?;
    let pipeline = file.to_pipeline()?;
    debug!(pipeline = %pipeline.name, jobs = pipeline.jobs.len(), "pipeline loaded");
    Ok(pipeline)
}

/// Pipeline variables, then the .env file, then `--var` overrides
fn build_variables(pipeline: &Pipeline, cmd: &RunCommand) -> Variables {
    let mut vars: Variables = pipeline.variables.clone().into_iter().collect();

    if !cmd.env_file.as_os_str().is_empty() {
        match parse_env_file(&cmd.env_file) {
            Ok(env) => vars.extend(env),
            Err(e) => debug!(path = %cmd.env_file.display(), error = %e, "no env file loaded"),
        }
    }

    vars.extend(cmd.vars.iter().cloned());
    vars
}

async fn run_pipeline(cmd: &RunCommand) -> i32 {
    let pipeline = match load(&cmd.file) {
        Ok(pipeline) => pipeline,
        Err(e) => return report(&e),
    };
    let mut vars = build_variables(&pipeline, cmd);

    if cmd.dry_run {
        print!("{}", format_dry_run(&pipeline, &vars));
        return exit_code::SUCCESS;
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping run");
            interrupt.cancel();
        }
    });

    let shell = cmd
        .shell
        .as_deref()
        .map(Shell::from_name)
        .unwrap_or_default();
    let context = RunContext::new()
        .with_shell(shell)
        .with_silent(cmd.silent)
        .with_persist_dir(cmd.persist_logs.clone())
        .with_cancel(cancel);

    let mut log = EvidenceLog::new(&pipeline.name, Uuid::new_v4());
    if let Some(dir) = &context.persist_dir {
        if let Err(e) = log.persist_to(dir) {
            warn!(error = %format!("{:#}", e), "run log will only be kept in memory");
        }
    }

    let reporter = Arc::new(ConsoleReporter::new(cmd.silent));
    let mut engine = ExecutionEngine::new(ShellSupervisor::new(), context);
    let handler = reporter.clone();
    engine.add_event_handler(move |event| handler.handle(&event));

    let result = engine.execute(&pipeline, &mut vars, &mut log).await;
    let log_dir = log.finish(result.is_ok());

    match result {
        Ok(status) => {
            println!(
                "{}",
                format_completion(&pipeline.name, status, log_dir.as_deref())
            );
            if let Some(dir) = &log_dir {
                eprintln!("logs preserved at {}", dir.display());
            }
            exit_code::SUCCESS
        }
        Err(e) => {
            if let Some(dir) = &log_dir {
                eprintln!("logs preserved at {}", dir.display());
            }
            e.exit_code()
        }
    }
}

fn validate_pipeline(cmd: &ValidateCommand) -> i32 {
    let loaded = load(&cmd.file).and_then(|pipeline| {
        let order: Vec<String> = pipeline
            .ordered_jobs()?
            .into_iter()
            .map(|job| job.name)
            .collect();
        Ok((pipeline, order))
    });

    let (pipeline, order) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{}Validation failed:", CROSS);
            return report(&e);
        }
    };

    if cmd.json {
        match serde_json::to_string_pretty(&validation_json(&pipeline, &order)) {
            Ok(json) => println!("{}", json),
            Err(e) => return report(&e.into()),
        }
    } else {
        println!("{}", format_validation(&pipeline, &order));
    }
    exit_code::SUCCESS
}

fn new_pipeline(cmd: &NewCommand) -> i32 {
    let written = PipelineFile::scaffold(&cmd.name)
        .to_yaml()
        .and_then(|yaml| {
            std::fs::write(&cmd.output, yaml)
                .with_context(|| format!("failed to write {}", cmd.output.display()))
        });

    match written {
        Ok(()) => {
            println!("generated {}", cmd.output.display());
            exit_code::SUCCESS
        }
        Err(e) => report(&e),
    }
}
