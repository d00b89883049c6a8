//! CLI command definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for run results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// The whole run report as JSON
    #[default]
    Json,
    /// Only the final step's output
    Text,
}

/// CLI arguments for council
#[derive(Parser, Debug)]
#[command(name = "council")]
#[command(author, version, about = "Run a council of workers through a sequence of steps")]
#[command(long_about = r#"
Council runs a task through a workflow of steps. Each step dispatches the
task to one or more workers (shell commands) and records the result in a
shared context that later steps can read.

Step kinds:
  solo      One worker answers
  parallel  Every worker answers independently
  debate    Workers propose, revise and vote on a winner
  split     The task is split into items, one fresh worker per item

Configuration files are loaded from (in priority order):
1. COUNCIL_* environment variables (COUNCIL_RUN__MAX_HISTORY=10)
2. --config <path>     Explicit config file
3. ./council.toml      Project-level config
4. ~/.config/council/config.toml   Global config

Example:
  council run "Design a cache for our API"
  council --config review.toml run --output text < task.md
  council validate
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the configured workflow on a task
    Run {
        /// The task; read from stdin when omitted or "-"
        task: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        output: OutputFormat,

        /// Write the JSONL event transcript here (overrides log.events_path)
        #[arg(long, value_name = "PATH")]
        events: Option<PathBuf>,

        /// Suppress progress lines on stderr
        #[arg(short, long)]
        quiet: bool,
    },

    /// Check the configuration and list the workflow's steps
    Validate,
}
