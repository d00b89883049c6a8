//! Run events observed through the event bus.

use crate::core::worker_id::WorkerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RunStarted,
    RunCompleted,
    RunFailed,
    StepStarted,
    StepCompleted,
    StepFailed,
    StepRetry,
    StepFallback,
    WorkerStarted,
    WorkerCompleted,
    WorkerFailed,
    DebatePhase,
    ProposalSubmitted,
    DebateConverged,
    VoteCast,
    DecisionRecorded,
    ContextSummarized,
    ContextOverflowWarning,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::RunStarted => "run_started",
            EventKind::RunCompleted => "run_completed",
            EventKind::RunFailed => "run_failed",
            EventKind::StepStarted => "step_started",
            EventKind::StepCompleted => "step_completed",
            EventKind::StepFailed => "step_failed",
            EventKind::StepRetry => "step_retry",
            EventKind::StepFallback => "step_fallback",
            EventKind::WorkerStarted => "worker_started",
            EventKind::WorkerCompleted => "worker_completed",
            EventKind::WorkerFailed => "worker_failed",
            EventKind::DebatePhase => "debate_phase",
            EventKind::ProposalSubmitted => "proposal_submitted",
            EventKind::DebateConverged => "debate_converged",
            EventKind::VoteCast => "vote_cast",
            EventKind::DecisionRecorded => "decision_recorded",
            EventKind::ContextSummarized => "context_summarized",
            EventKind::ContextOverflowWarning => "context_overflow_warning",
        }
    }

    /// Warnings and failures, as opposed to progress notifications
    pub fn is_problem(&self) -> bool {
        matches!(
            self,
            EventKind::RunFailed
                | EventKind::StepFailed
                | EventKind::StepRetry
                | EventKind::StepFallback
                | EventKind::WorkerFailed
                | EventKind::ContextOverflowWarning
        )
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event before the bus accepted it
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub kind: EventKind,
    pub step_name: Option<String>,
    pub worker_id: Option<WorkerId>,
    pub payload: serde_json::Value,
}

impl EventDraft {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            step_name: None,
            worker_id: None,
            payload: serde_json::Value::Null,
        }
    }

    pub fn step(mut self, step_name: impl Into<String>) -> Self {
        self.step_name = Some(step_name.into());
        self
    }

    pub fn worker(mut self, worker_id: WorkerId) -> Self {
        self.worker_id = Some(worker_id);
        self
    }

    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Stamp the draft with its sequence number and acceptance time
    pub fn accept(self, sequence: u64) -> Event {
        Event {
            sequence,
            kind: self.kind,
            timestamp: Utc::now(),
            step_name: self.step_name,
            worker_id: self.worker_id,
            payload: self.payload,
        }
    }
}

/// An accepted, immutable event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub sequence: u64,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<WorkerId>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {}", self.sequence, self.kind)?;
        if let Some(step) = &self.step_name {
            write!(f, " step={}", step)?;
        }
        if let Some(worker) = &self.worker_id {
            write!(f, " worker={}", worker)?;
        }
        Ok(())
    }
}
