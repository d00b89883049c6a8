//! Step results committed to the context.

use crate::core::string::truncate;
use crate::core::worker_id::WorkerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Marker stored in `contributions` for a worker that failed
pub const FAILURE_MARKER: &str = "[failed]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Partial,
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Success => write!(f, "success"),
            StepStatus::Partial => write!(f, "partial"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of one worker inside a fan-out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerOutcome {
    Ok { text: String },
    Failed { error: String },
}

impl WorkerOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, WorkerOutcome::Ok { .. })
    }

    /// Text for `contributions`: the answer or the failure marker
    pub fn contribution(&self) -> String {
        match self {
            WorkerOutcome::Ok { text } => text.clone(),
            WorkerOutcome::Failed { error } => format!("{} {}", FAILURE_MARKER, error),
        }
    }
}

/// One work item's result in a split step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemOutput {
    pub index: usize,
    pub worker_id: WorkerId,
    pub item: String,
    pub outcome: WorkerOutcome,
}

/// What a step produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StepOutput {
    /// Solo and debate steps
    Text(String),
    /// Parallel steps, in worker order
    PerWorker(Vec<(WorkerId, WorkerOutcome)>),
    /// Split steps, in work-item order
    Items(Vec<ItemOutput>),
    /// Failed steps recorded under the continue policy
    None,
}

impl StepOutput {
    /// Plain-text rendering used for the history message of a step
    pub fn render(&self) -> String {
        match self {
            StepOutput::Text(text) => text.clone(),
            StepOutput::PerWorker(outcomes) => outcomes
                .iter()
                .map(|(worker, outcome)| format!("[{}] {}", worker, outcome.contribution()))
                .collect::<Vec<_>>()
                .join("\n\n"),
            StepOutput::Items(items) => items
                .iter()
                .map(|item| {
                    format!(
                        "[{} #{}] {}",
                        item.worker_id,
                        item.index + 1,
                        item.outcome.contribution()
                    )
                })
                .collect::<Vec<_>>()
                .join("\n\n"),
            StepOutput::None => String::new(),
        }
    }

    /// Short preview for events and logs
    pub fn preview(&self, max_len: usize) -> String {
        truncate(&self.render(), max_len)
    }
}

/// Committed outcome of a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: String,
    pub status: StepStatus,
    pub output: StepOutput,
    pub contributions: BTreeMap<WorkerId, String>,
    pub duration_ms: u64,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl StepResult {
    pub fn new(step_name: impl Into<String>, status: StepStatus, output: StepOutput) -> Self {
        Self {
            step_name: step_name.into(),
            status,
            output,
            contributions: BTreeMap::new(),
            duration_ms: 0,
            attempts: 1,
            error: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn success(step_name: impl Into<String>, output: StepOutput) -> Self {
        Self::new(step_name, StepStatus::Success, output)
    }

    /// A failed result recording `error`, used when a run continues past a failure
    pub fn failed(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        let mut result = Self::new(step_name, StepStatus::Failed, StepOutput::None);
        result.error = Some(error.into());
        result
    }

    pub fn with_contribution(mut self, worker: WorkerId, text: impl Into<String>) -> Self {
        self.contributions.insert(worker, text.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }
}
