//! CLI entrypoint for council
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

mod args;
mod progress;

use anyhow::{Context as _, Result, bail};
use args::{Cli, Command, OutputFormat};
use clap::Parser;
use council_application::{EventBus, RunReport};
use council_infrastructure::{
    ConfigIssue, ConfigLoader, ConfigSources, FileConfig, JsonlEventLog, Workflow,
};
use progress::ProgressReporter;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::load(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to load configuration")?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _guard = init_logging(cli.verbose, config.log.dir.as_deref());

    match cli.command {
        Command::Validate => validate(&config, cli.config.as_deref()),
        Command::Run {
            task,
            output,
            events,
            quiet,
        } => {
            let task = read_task(task)?;
            let events_path = events.or_else(|| config.log.events_path.clone());
            let report = run(&config, task, events_path, quiet).await?;
            print_report(&report, output)
        }
    }
}

/// Initialize logging based on verbosity level, plus an optional daily log file
fn init_logging(verbose: u8, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "council.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .init();
    guard
}

/// The task argument, or stdin when it is missing or "-"
fn read_task(task: Option<String>) -> Result<String> {
    let task = match task {
        Some(task) if task != "-" => task,
        _ => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read the task from stdin")?;
            input
        }
    };
    if task.trim().is_empty() {
        bail!("Task is empty. Pass it as an argument or on stdin.");
    }
    Ok(task)
}

fn report_warnings(warnings: &[ConfigIssue]) {
    for issue in warnings {
        warn!("{}", issue);
    }
}

fn validate(config: &FileConfig, explicit: Option<&Path>) -> Result<()> {
    println!("Configuration sources (in priority order):");
    for line in ConfigSources::discover(explicit).describe() {
        println!("{}", line);
    }
    println!();

    let issues = config.validate();
    for issue in &issues {
        println!("{}", issue);
    }

    let workflow = Workflow::from_config(config)?;
    println!("Workflow ({} step(s)):", workflow.steps.len());
    for (index, step) in workflow.steps.iter().enumerate() {
        println!("  {}. {} ({})", index + 1, step.name(), step.kind());
    }
    Ok(())
}

async fn run(
    config: &FileConfig,
    task: String,
    events_path: Option<PathBuf>,
    quiet: bool,
) -> Result<RunReport> {
    // === Dependency Injection ===
    let workflow = Workflow::from_config(config)?;
    report_warnings(&workflow.warnings);

    let bus = EventBus::with_capacity(
        workflow.settings.event_capacity,
        workflow.settings.event_retain,
    )
    .shared();

    let mut listeners = Vec::new();
    if !quiet {
        let reporter = ProgressReporter::new(bus.subscribe());
        listeners.push(tokio::spawn(reporter.run()));
    }
    if let Some(path) = events_path {
        match JsonlEventLog::new(&path) {
            Some(log) => {
                info!(path = %log.path().display(), "Recording events");
                let subscription = bus.subscribe();
                listeners.push(tokio::spawn(async move {
                    log.follow(subscription).await;
                }));
            }
            None => warn!(path = %path.display(), "Event log disabled"),
        }
    }

    let orchestrator = workflow.into_orchestrator(bus.clone());
    drop(bus);

    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping after the current step");
            cancel.cancel();
        }
    });

    let result = orchestrator.run(&task).await;

    // Listeners finish once the last bus handle is gone
    drop(orchestrator);
    for listener in listeners {
        let _ = listener.await;
    }

    Ok(result?)
}

fn print_report(report: &RunReport, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Text => match report.final_result() {
            Some(result) => println!("{}", result.output.render()),
            None => bail!("The workflow produced no results"),
        },
    }
    Ok(())
}
