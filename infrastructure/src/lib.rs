//! Infrastructure layer for council
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: shell-command workers, summarizer and
//! fallback, configuration file loading, and the JSONL event log.

pub mod command;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use command::{
    CommandError, CommandFallback, CommandSummarizer, CommandWorker, CommandWorkerTemplate,
};
pub use config::{
    ConfigError, ConfigIssue, ConfigLoader, ConfigSources, FileConfig, Severity, Workflow,
};
pub use logging::JsonlEventLog;
