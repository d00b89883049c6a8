//! Run Workflow use case
//!
//! [`StepOrchestrator`] runs an ordered list of [`Step`]s against one
//! [`Context`]. Steps run strictly in sequence: step N+1 starts only after
//! step N's result is committed. Every step receives the same task and sees
//! earlier steps through its workers' views of the context.
//!
//! Per step the orchestrator commits, in this order: the buffered memory
//! writes, the decision (if any), the step result, and one `step:<name>`
//! history message carrying the rendered output.

use crate::config::RunSettings;
use crate::events::SharedEventBus;
use crate::ports::fallback::FallbackError;
use crate::ports::summarizer::Summarizer;
use crate::use_cases::context_window::ContextWindow;
use crate::use_cases::error_handler::{ErrorHandler, Escalation, FailurePolicy};
use crate::use_cases::moderators::ModeratorPool;
use crate::use_cases::steps::{Step, StepContext, StepError, StepOutcome};
use chrono::{DateTime, Utc};
use council_domain::core::string::truncate;
use council_domain::{
    Context, ContextSnapshot, Decision, EventDraft, EventKind, FAILURE_MARKER, Role, StepResult,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that end a run
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Invalid workflow: {0}")]
    Validation(StepError),

    #[error("Run halted at step '{step}' after {completed} completed step(s): {source}")]
    StepFailed {
        step: String,
        #[source]
        source: StepError,
        completed: usize,
    },

    #[error("Step '{step}' failed ({source}) and its fallback failed: {reason}")]
    FallbackFailed {
        step: String,
        #[source]
        source: StepError,
        reason: FallbackError,
    },

    #[error("Step '{step}' failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        step: String,
        attempts: u32,
        #[source]
        source: StepError,
    },

    #[error("Run cancelled after {completed} completed step(s)")]
    Cancelled { completed: usize },
}

impl OrchestratorError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OrchestratorError::Cancelled { .. })
    }
}

/// Everything a finished run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub task: String,
    pub results: Vec<StepResult>,
    pub decisions: Vec<Decision>,
    pub snapshot: ContextSnapshot,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Result of the last step, the run's final answer
    pub fn final_result(&self) -> Option<&StepResult> {
        self.results.last()
    }
}

pub struct StepOrchestrator {
    steps: Vec<Step>,
    bus: SharedEventBus,
    handler: ErrorHandler,
    window: ContextWindow,
    settings: RunSettings,
    cancel: CancellationToken,
}

impl StepOrchestrator {
    pub fn new(steps: Vec<Step>, bus: SharedEventBus) -> Self {
        Self {
            steps,
            bus,
            handler: ErrorHandler::default(),
            window: ContextWindow::new(),
            settings: RunSettings::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Policy for every step without an override
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.handler.set_default(policy);
        self
    }

    pub fn with_step_policy(mut self, step: impl Into<String>, policy: FailurePolicy) -> Self {
        self.handler.set_override(step, policy);
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.window = self.window.with_summarizer(summarizer);
        self
    }

    pub fn with_settings(mut self, settings: RunSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Give every debate step without a moderator one from `pool`
    pub fn with_moderator_pool(mut self, mut pool: ModeratorPool) -> Self {
        pool.assign(&mut self.steps);
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn bus(&self) -> &SharedEventBus {
        &self.bus
    }

    /// Token that cancels this orchestrator's runs
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Validate every step; nothing is dispatched
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        let mut names = HashSet::new();
        for step in &self.steps {
            step.validate().map_err(OrchestratorError::Validation)?;
            if !names.insert(step.name()) {
                return Err(OrchestratorError::Validation(StepError::validation(
                    step.name(),
                    "step name is used more than once",
                )));
            }
        }
        Ok(())
    }

    /// Run the workflow on a fresh context
    pub async fn run(&self, task: &str) -> Result<RunReport, OrchestratorError> {
        let mut context = Context::new(self.settings.max_history);
        self.run_with_context(task, &mut context).await
    }

    /// Run the workflow on a caller-provided context
    pub async fn run_with_context(
        &self,
        task: &str,
        context: &mut Context,
    ) -> Result<RunReport, OrchestratorError> {
        self.validate()?;

        let started_at = Utc::now();
        info!(steps = self.steps.len(), task = %truncate(task, 80), "Run started");
        self.bus.publish(EventDraft::new(EventKind::RunStarted).payload(json!({
            "steps": self.steps.iter().map(|s| s.name()).collect::<Vec<_>>(),
            "task_bytes": task.len(),
        })));
        self.window
            .add_message(context, &self.bus, Role::User, task)
            .await;

        for (index, step) in self.steps.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(self.abort(OrchestratorError::Cancelled { completed: index }));
            }

            let policy = self.handler.policy_for(step.name()).kind();
            debug!(step = step.name(), kind = %step.kind(), %policy, "Step started");
            self.bus.publish(
                EventDraft::new(EventKind::StepStarted)
                    .step(step.name())
                    .payload(json!({ "index": index, "kind": step.kind(), "policy": policy })),
            );

            let started = Instant::now();
            let executed = {
                let ctx = StepContext {
                    context: &*context,
                    bus: self.bus.as_ref(),
                    cancel: &self.cancel,
                    policy,
                    settings: &self.settings,
                };
                self.handler.execute(step, task, &ctx).await
            };
            let mut outcome = match executed {
                Ok(outcome) => outcome,
                Err(escalation) => {
                    return Err(self.abort(Self::escalated(step, escalation, index)));
                }
            };
            outcome.result.duration_ms = started.elapsed().as_millis() as u64;
            self.commit(context, outcome).await;
        }

        let finished_at = Utc::now();
        info!(steps = self.steps.len(), "Run completed");
        self.bus.publish(
            EventDraft::new(EventKind::RunCompleted)
                .payload(json!({ "steps": self.steps.len(), "decisions": context.decisions().len() })),
        );

        Ok(RunReport {
            task: task.to_string(),
            results: context.results().to_vec(),
            decisions: context.decisions().to_vec(),
            snapshot: context.snapshot(),
            started_at,
            finished_at,
        })
    }

    async fn commit(&self, context: &mut Context, outcome: StepOutcome) {
        let StepOutcome {
            result,
            decision,
            writes,
        } = outcome;
        let step_name = result.step_name.clone();

        let applied = context.apply_writes(writes);
        if let Some(decision) = decision {
            self.bus.publish(
                EventDraft::new(EventKind::DecisionRecorded)
                    .step(&step_name)
                    .worker(decision.winner.clone())
                    .payload(json!({
                        "method": decision.method,
                        "resolution": decision.resolution,
                        "rationale": decision.rationale,
                    })),
            );
            context.record_decision(decision);
        }

        let body = match &result.error {
            Some(error) => format!("{} {}", FAILURE_MARKER, error),
            None => result.output.preview(self.settings.history_preview_bytes),
        };
        let completed = json!({
            "status": result.status,
            "duration_ms": result.duration_ms,
            "attempts": result.attempts,
            "writes": applied,
        });
        context.record_result(result);

        self.window
            .add_message(context, &self.bus, Role::Step, format!("step:{}\n{}", step_name, body))
            .await;
        if let Some(threshold) = self.settings.summarize_threshold_bytes {
            self.window
                .summarize_if_large(context, &self.bus, threshold)
                .await;
        }

        self.bus.publish(
            EventDraft::new(EventKind::StepCompleted)
                .step(&step_name)
                .payload(completed),
        );
    }

    fn escalated(step: &Step, escalation: Escalation, completed: usize) -> OrchestratorError {
        let step = step.name().to_string();
        match escalation {
            Escalation::Halt(source) => OrchestratorError::StepFailed {
                step,
                source,
                completed,
            },
            Escalation::FallbackFailed { source, reason } => OrchestratorError::FallbackFailed {
                step,
                source,
                reason,
            },
            Escalation::RetriesExhausted { attempts, source } => {
                OrchestratorError::RetriesExhausted {
                    step,
                    attempts,
                    source,
                }
            }
            Escalation::Cancelled => OrchestratorError::Cancelled { completed },
        }
    }

    fn abort(&self, error: OrchestratorError) -> OrchestratorError {
        warn!(error = %error, "Run failed");
        self.bus.publish(EventDraft::new(EventKind::RunFailed).payload(json!({
            "error": error.to_string(),
            "cancelled": error.is_cancelled(),
        })));
        error
    }
}
