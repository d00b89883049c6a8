//! Failure policies applied around a step's execution.
//!
//! [`ErrorHandler`] runs a [`Step`] and, when it raises a [`StepError`],
//! applies the step's [`FailurePolicy`]:
//!
//! - **halt**: escalate at once
//! - **continue**: replace the outcome with a `failed` [`StepResult`]
//! - **retry**: re-run the whole step with exponential backoff; running out
//!   of attempts escalates like halt
//! - **fallback**: ask a [`FallbackHandler`] for a replacement result; if it
//!   fails too, escalate like halt
//!
//! Cancellation is never subject to policy.

use crate::ports::fallback::{FallbackError, FallbackHandler};
use crate::use_cases::steps::{Step, StepContext, StepError, StepOutcome};
use council_domain::{EventDraft, EventKind, StepResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Policy names, as written in configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    Halt,
    Continue,
    Retry,
    Fallback,
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::Halt => "halt",
            PolicyKind::Continue => "continue",
            PolicyKind::Retry => "retry",
            PolicyKind::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "halt" => Ok(PolicyKind::Halt),
            "continue" => Ok(PolicyKind::Continue),
            "retry" => Ok(PolicyKind::Retry),
            "fallback" => Ok(PolicyKind::Fallback),
            _ => Err(format!(
                "Invalid policy: {}. Valid options: halt, continue, retry, fallback",
                s
            )),
        }
    }
}

/// Attempt budget and backoff for the retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Default::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Wait before `attempt` (1-based): zero for the first attempt, then
    /// `base_delay * 2^(attempt - 2)`, capped at `max_delay`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 2).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Clone, Default)]
pub enum FailurePolicy {
    #[default]
    Halt,
    Continue,
    Retry(RetryPolicy),
    Fallback(Arc<dyn FallbackHandler>),
}

impl FailurePolicy {
    pub fn kind(&self) -> PolicyKind {
        match self {
            FailurePolicy::Halt => PolicyKind::Halt,
            FailurePolicy::Continue => PolicyKind::Continue,
            FailurePolicy::Retry(_) => PolicyKind::Retry,
            FailurePolicy::Fallback(_) => PolicyKind::Fallback,
        }
    }
}

impl std::fmt::Debug for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::Retry(retry) => f.debug_tuple("Retry").field(retry).finish(),
            other => f.write_str(other.kind().as_str()),
        }
    }
}

/// A failure the policy could not absorb
#[derive(Error, Debug)]
pub enum Escalation {
    #[error(transparent)]
    Halt(StepError),

    #[error("{source}; fallback failed: {reason}")]
    FallbackFailed {
        source: StepError,
        reason: FallbackError,
    },

    #[error("{source} (gave up after {attempts} attempts)")]
    RetriesExhausted { attempts: u32, source: StepError },

    #[error("cancelled")]
    Cancelled,
}

/// Default policy plus per-step overrides
#[derive(Debug, Clone, Default)]
pub struct ErrorHandler {
    default: FailurePolicy,
    overrides: HashMap<String, FailurePolicy>,
}

impl ErrorHandler {
    pub fn new(default: FailurePolicy) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn set_default(&mut self, policy: FailurePolicy) {
        self.default = policy;
    }

    pub fn set_override(&mut self, step: impl Into<String>, policy: FailurePolicy) {
        self.overrides.insert(step.into(), policy);
    }

    pub fn policy_for(&self, step: &str) -> &FailurePolicy {
        self.overrides.get(step).unwrap_or(&self.default)
    }

    /// Execute `step`, applying its failure policy.
    ///
    /// `ctx.policy` should be the kind of [`ErrorHandler::policy_for`] this
    /// step, so the step can tell whether a worker failure must abort it.
    pub async fn execute(
        &self,
        step: &Step,
        task: &str,
        ctx: &StepContext<'_>,
    ) -> Result<StepOutcome, Escalation> {
        let error = match step.execute(task, ctx).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) if e.is_cancelled() => return Err(Escalation::Cancelled),
            Err(e) => e,
        };

        match self.policy_for(step.name()) {
            FailurePolicy::Halt => {
                publish_failed(ctx, step, &error, PolicyKind::Halt);
                Err(Escalation::Halt(error))
            }
            FailurePolicy::Continue => {
                publish_failed(ctx, step, &error, PolicyKind::Continue);
                info!(step = step.name(), error = %error, "Step failed; continuing");
                let result = StepResult::failed(step.name(), error.to_string())
                    .with_metadata("policy", json!(PolicyKind::Continue));
                Ok(StepOutcome::new(result))
            }
            FailurePolicy::Retry(retry) => self.retry(step, task, ctx, retry, error).await,
            FailurePolicy::Fallback(handler) => {
                publish_failed(ctx, step, &error, PolicyKind::Fallback);
                Self::fallback(handler.as_ref(), step, task, ctx, error).await
            }
        }
    }

    async fn retry(
        &self,
        step: &Step,
        task: &str,
        ctx: &StepContext<'_>,
        retry: &RetryPolicy,
        first_error: StepError,
    ) -> Result<StepOutcome, Escalation> {
        let mut last_error = first_error;
        let mut backoff_ms: Vec<u64> = Vec::new();

        for attempt in 2..=retry.max_attempts {
            let delay = retry.delay_before(attempt);
            warn!(
                step = step.name(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %last_error,
                "Step failed; retrying"
            );
            ctx.bus.publish(
                EventDraft::new(EventKind::StepRetry)
                    .step(step.name())
                    .payload(json!({
                        "attempt": attempt,
                        "max_attempts": retry.max_attempts,
                        "delay_ms": delay.as_millis() as u64,
                        "error": last_error.to_string(),
                    })),
            );

            tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => return Err(Escalation::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            backoff_ms.push(delay.as_millis() as u64);

            match step.execute(task, ctx).await {
                Ok(mut outcome) => {
                    let result = &mut outcome.result;
                    result.attempts = attempt;
                    result.metadata.insert("attempts".to_string(), json!(attempt));
                    result.metadata.insert("backoff_ms".to_string(), json!(backoff_ms));
                    return Ok(outcome);
                }
                Err(e) if e.is_cancelled() => return Err(Escalation::Cancelled),
                Err(e) => last_error = e,
            }
        }

        publish_failed(ctx, step, &last_error, PolicyKind::Retry);
        Err(Escalation::RetriesExhausted {
            attempts: retry.max_attempts.max(1),
            source: last_error,
        })
    }

    async fn fallback(
        handler: &dyn FallbackHandler,
        step: &Step,
        task: &str,
        ctx: &StepContext<'_>,
        error: StepError,
    ) -> Result<StepOutcome, Escalation> {
        match handler.recover(&error, step, task, ctx.context).await {
            Ok(mut result) => {
                info!(step = step.name(), error = %error, "Step recovered by fallback");
                result.step_name = step.name().to_string();
                result.metadata.insert("fallback".to_string(), json!(true));
                result
                    .metadata
                    .insert("recovered_from".to_string(), json!(error.to_string()));
                ctx.bus.publish(
                    EventDraft::new(EventKind::StepFallback)
                        .step(step.name())
                        .payload(json!({ "error": error.to_string(), "status": result.status })),
                );
                Ok(StepOutcome::new(result))
            }
            Err(reason) => {
                warn!(step = step.name(), error = %error, reason = %reason, "Fallback failed");
                Err(Escalation::FallbackFailed {
                    source: error,
                    reason,
                })
            }
        }
    }
}

fn publish_failed(ctx: &StepContext<'_>, step: &Step, error: &StepError, policy: PolicyKind) {
    ctx.bus.publish(
        EventDraft::new(EventKind::StepFailed)
            .step(step.name())
            .payload(json!({ "error": error.to_string(), "policy": policy })),
    );
}
