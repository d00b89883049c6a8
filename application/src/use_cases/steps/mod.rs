//! Step variants.
//!
//! A workflow is an ordered list of [`Step`]s. Every variant runs through
//! the same [`Step::execute`] entry point and returns a [`StepOutcome`]:
//! the result to commit, an optional decision, and the memory writes its
//! workers buffered in their views. Steps only read the [`Context`]; the
//! orchestrator applies the outcome afterwards.

pub mod debate;
pub mod dispatch;
pub mod parallel;
pub mod solo;
pub mod split;

use crate::config::RunSettings;
use crate::events::EventBus;
use crate::ports::worker::WorkerError;
use crate::use_cases::error_handler::PolicyKind;
use council_domain::{Context, Decision, MemoryWrite, StepResult, WorkerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use debate::DebateStep;
pub use parallel::{
    Capabilities, IdenticalTask, LineChunks, ParallelStep, Perspectives, TaskSpecializer,
};
pub use solo::SoloStep;
pub use split::SplitStep;

/// Errors raised by a step's execution
#[derive(Error, Debug, Clone)]
pub enum StepError {
    #[error("Invalid step '{step}': {reason}")]
    Validation { step: String, reason: String },

    #[error("All {count} workers failed in step '{step}'")]
    AllWorkersFailed { step: String, count: usize },

    #[error("Step '{step}' produced no proposals")]
    NoProposals { step: String },

    #[error("Worker {worker} failed in step '{step}': {source}")]
    WorkerAborted {
        step: String,
        worker: WorkerId,
        #[source]
        source: WorkerError,
    },

    #[error("Step '{0}' was cancelled")]
    Cancelled(String),
}

impl StepError {
    pub fn validation(step: &str, reason: impl Into<String>) -> Self {
        StepError::Validation {
            step: step.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StepError::Cancelled(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Solo,
    Parallel,
    Debate,
    Split,
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepKind::Solo => write!(f, "solo"),
            StepKind::Parallel => write!(f, "parallel"),
            StepKind::Debate => write!(f, "debate"),
            StepKind::Split => write!(f, "split"),
        }
    }
}

impl std::str::FromStr for StepKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "solo" => Ok(StepKind::Solo),
            "parallel" => Ok(StepKind::Parallel),
            "debate" => Ok(StepKind::Debate),
            "split" => Ok(StepKind::Split),
            _ => Err(format!(
                "Invalid step kind: {} (expected solo, parallel, debate or split)",
                s
            )),
        }
    }
}

/// Everything a step may use while it runs
pub struct StepContext<'a> {
    /// Read-only; views are forked from it
    pub context: &'a Context,
    pub bus: &'a EventBus,
    pub cancel: &'a CancellationToken,
    /// Policy the orchestrator applies if this step fails
    pub policy: PolicyKind,
    pub settings: &'a RunSettings,
}

/// What the orchestrator commits after a step
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub result: StepResult,
    pub decision: Option<Decision>,
    pub writes: Vec<MemoryWrite>,
}

impl StepOutcome {
    pub fn new(result: StepResult) -> Self {
        Self {
            result,
            decision: None,
            writes: Vec::new(),
        }
    }

    pub fn with_decision(mut self, decision: Decision) -> Self {
        self.decision = Some(decision);
        self
    }

    pub fn with_writes(mut self, writes: Vec<MemoryWrite>) -> Self {
        self.writes = writes;
        self
    }
}

/// Closed set of step variants
pub enum Step {
    Solo(SoloStep),
    Parallel(ParallelStep),
    Debate(DebateStep),
    Split(SplitStep),
}

impl Step {
    pub fn name(&self) -> &str {
        match self {
            Step::Solo(s) => &s.name,
            Step::Parallel(s) => &s.name,
            Step::Debate(s) => &s.name,
            Step::Split(s) => &s.name,
        }
    }

    pub fn kind(&self) -> StepKind {
        match self {
            Step::Solo(_) => StepKind::Solo,
            Step::Parallel(_) => StepKind::Parallel,
            Step::Debate(_) => StepKind::Debate,
            Step::Split(_) => StepKind::Split,
        }
    }

    /// Check the step's configuration without dispatching anything
    pub fn validate(&self) -> Result<(), StepError> {
        if self.name().trim().is_empty() {
            return Err(StepError::validation(self.name(), "step name is empty"));
        }
        match self {
            Step::Solo(_) => Ok(()),
            Step::Parallel(s) => s.validate(),
            Step::Debate(s) => s.validate(),
            Step::Split(s) => s.validate(),
        }
    }

    pub async fn execute(&self, task: &str, ctx: &StepContext<'_>) -> Result<StepOutcome, StepError> {
        if ctx.cancel.is_cancelled() {
            return Err(StepError::Cancelled(self.name().to_string()));
        }
        match self {
            Step::Solo(s) => s.execute(task, ctx).await,
            Step::Parallel(s) => s.execute(task, ctx).await,
            Step::Debate(s) => s.execute(task, ctx).await,
            Step::Split(s) => s.execute(task, ctx).await,
        }
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}

/// Reject an empty worker list or a repeated worker id
pub(crate) fn validate_worker_ids<'a>(
    step: &str,
    ids: impl IntoIterator<Item = &'a WorkerId>,
    min: usize,
) -> Result<(), StepError> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(StepError::validation(step, format!("worker '{}' appears twice", id)));
        }
    }
    if seen.len() < min {
        return Err(StepError::validation(
            step,
            format!("needs at least {} worker(s), got {}", min, seen.len()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedWorker;
    use std::sync::Arc;

    #[test]
    fn test_step_kind_parse() {
        assert_eq!("Debate".parse::<StepKind>().unwrap(), StepKind::Debate);
        assert!("vote".parse::<StepKind>().is_err());
        assert_eq!(StepKind::Split.to_string(), "split");
    }

    #[test]
    fn test_validate_worker_ids() {
        let a = WorkerId::new("a");
        let b = WorkerId::new("b");
        assert!(validate_worker_ids("s", [&a, &b], 2).is_ok());
        assert!(validate_worker_ids("s", [&a, &a], 1).is_err());
        assert!(validate_worker_ids("s", [&a], 2).is_err());
        assert!(validate_worker_ids("s", std::iter::empty(), 1).is_err());
    }

    #[test]
    fn test_empty_name_is_invalid() {
        let step = Step::Solo(SoloStep::new(" ", Arc::new(ScriptedWorker::fixed("a", "x"))));
        assert!(matches!(step.validate(), Err(StepError::Validation { .. })));
    }
}
