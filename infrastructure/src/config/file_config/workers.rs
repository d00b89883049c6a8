//! Worker and summarizer configuration from TOML (`[[workers]]`, `[summarizer]`)

use serde::{Deserialize, Serialize};

/// One command-backed worker
///
/// # Example
///
/// ```toml
/// [[workers]]
/// id = "critic"
/// command = "llm -m gpt-4o -s 'You are a harsh critic'"
/// ```
///
/// The same entry doubles as a template for split steps, which clone it
/// into `critic#1`, `critic#2`, ...
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileWorkerConfig {
    pub id: String,
    pub command: String,
    /// Skip the rendered context preamble and send only the task
    pub bare: bool,
}

/// History summarizer; without a command, overflow only raises a warning event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSummarizerConfig {
    pub command: Option<String>,
}
