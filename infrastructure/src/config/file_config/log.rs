//! Logging configuration from TOML (`[log]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where run output is recorded
///
/// # Example
///
/// ```toml
/// [log]
/// events_path = "runs/latest.events.jsonl"   # JSONL event transcript
/// dir = "logs"                               # daily rolling diagnostics
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLogConfig {
    pub events_path: Option<PathBuf>,
    pub dir: Option<PathBuf>,
}
