//! Run configuration from TOML (`[run]` section)

use council_application::RunSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw run settings
///
/// # Example
///
/// ```toml
/// [run]
/// max_history = 50
/// summarize_threshold_bytes = 32768   # 0 disables size-based summarization
/// worker_timeout_secs = 300           # 0 disables the per-call timeout
/// event_capacity = 256
/// event_retain = 1024
/// moderators = ["chair", "critic"]   # round-robin for debates without a moderator
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRunConfig {
    pub max_history: usize,
    pub summarize_threshold_bytes: usize,
    pub worker_timeout_secs: u64,
    pub event_capacity: usize,
    pub event_retain: usize,
    /// Worker ids handed out in turn to debate steps that name no moderator
    pub moderators: Vec<String>,
}

impl Default for FileRunConfig {
    fn default() -> Self {
        let defaults = RunSettings::default();
        Self {
            max_history: defaults.max_history,
            summarize_threshold_bytes: defaults.summarize_threshold_bytes.unwrap_or(0),
            worker_timeout_secs: defaults.worker_timeout.map_or(0, |d| d.as_secs()),
            event_capacity: defaults.event_capacity,
            event_retain: defaults.event_retain,
            moderators: Vec::new(),
        }
    }
}

impl FileRunConfig {
    pub fn to_run_settings(&self) -> RunSettings {
        RunSettings::default()
            .with_max_history(self.max_history)
            .with_summarize_threshold((self.summarize_threshold_bytes > 0).then_some(self.summarize_threshold_bytes))
            .with_worker_timeout(
                (self.worker_timeout_secs > 0).then(|| Duration::from_secs(self.worker_timeout_secs)),
            )
            .with_event_capacity(self.event_capacity.max(1))
            .with_event_retain(self.event_retain)
    }
}
