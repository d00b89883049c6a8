//! Concurrent fan-out to workers.
//!
//! [`fan_out`] spawns one task per assignment and waits until every one has
//! settled. Individual failures (errors, timeouts, panics) are captured per
//! worker and never short-circuit the join. Results come back in dispatch
//! order, whatever order the workers finished in.
//!
//! If the run is cancelled while waiting, the join returns
//! [`StepError::Cancelled`] at once. The in-flight calls are detached: they
//! run to completion and their results are discarded.

use super::{StepContext, StepError};
use crate::ports::worker::{Worker, WorkerError};
use council_domain::{EventDraft, EventKind, WorkerId, WorkerView};
use futures::FutureExt;
use serde_json::json;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

/// One unit of a fan-out
pub struct Assignment {
    pub worker: Arc<dyn Worker>,
    pub task: String,
    pub view: Arc<WorkerView>,
}

impl Assignment {
    pub fn new(worker: Arc<dyn Worker>, task: impl Into<String>, view: WorkerView) -> Self {
        Self {
            worker,
            task: task.into(),
            view: Arc::new(view),
        }
    }
}

/// How one assignment ended
pub struct Settled {
    pub worker_id: WorkerId,
    pub view: Arc<WorkerView>,
    pub outcome: Result<String, WorkerError>,
    pub elapsed: Duration,
}

impl Settled {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Dispatch all assignments concurrently and wait for every one to settle
pub async fn fan_out(
    step_name: &str,
    assignments: Vec<Assignment>,
    ctx: &StepContext<'_>,
) -> Result<Vec<Settled>, StepError> {
    if ctx.cancel.is_cancelled() {
        return Err(StepError::Cancelled(step_name.to_string()));
    }

    let total = assignments.len();
    let timeout = ctx.settings.worker_timeout;
    let mut slots: Vec<Option<(Result<String, WorkerError>, Duration)>> =
        (0..total).map(|_| None).collect();
    let mut meta: Vec<(WorkerId, Arc<WorkerView>)> = Vec::with_capacity(total);

    let mut join_set = JoinSet::new();
    for (index, assignment) in assignments.into_iter().enumerate() {
        let worker_id = assignment.worker.id().clone();
        meta.push((worker_id.clone(), Arc::clone(&assignment.view)));
        ctx.bus.publish(
            EventDraft::new(EventKind::WorkerStarted)
                .step(step_name)
                .worker(worker_id)
                .payload(json!({ "index": index, "task_bytes": assignment.task.len() })),
        );

        join_set.spawn(async move {
            let started = Instant::now();
            let outcome = call_worker(&assignment, timeout).await;
            (index, outcome, started.elapsed())
        });
    }
    debug!(step = step_name, workers = total, "Fan-out dispatched");

    loop {
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                warn!(step = step_name, pending = join_set.len(), "Fan-out cancelled; detaching workers");
                join_set.detach_all();
                return Err(StepError::Cancelled(step_name.to_string()));
            }
            next = join_set.join_next() => match next {
                None => break,
                Some(Ok((index, outcome, elapsed))) => {
                    publish_settled(ctx, step_name, &meta[index].0, &outcome, elapsed);
                    slots[index] = Some((outcome, elapsed));
                }
                Some(Err(join_error)) => {
                    // Panics are caught inside the task, so only aborts land here
                    warn!(step = step_name, error = %join_error, "Worker task did not complete");
                }
            }
        }
    }

    Ok(meta
        .into_iter()
        .zip(slots)
        .map(|((worker_id, view), slot)| {
            let (outcome, elapsed) = slot.unwrap_or_else(|| {
                (
                    Err(WorkerError::Panicked("worker task did not complete".to_string())),
                    Duration::ZERO,
                )
            });
            Settled {
                worker_id,
                view,
                outcome,
                elapsed,
            }
        })
        .collect())
}

async fn call_worker(
    assignment: &Assignment,
    timeout: Option<Duration>,
) -> Result<String, WorkerError> {
    let call = AssertUnwindSafe(assignment.worker.submit(&assignment.task, &assignment.view))
        .catch_unwind();
    let caught = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(caught) => caught,
            Err(_) => return Err(WorkerError::Timeout(limit)),
        },
        None => call.await,
    };
    caught.unwrap_or_else(|panic| Err(WorkerError::Panicked(panic_message(panic.as_ref()))))
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn publish_settled(
    ctx: &StepContext<'_>,
    step_name: &str,
    worker_id: &WorkerId,
    outcome: &Result<String, WorkerError>,
    elapsed: Duration,
) {
    let draft = match outcome {
        Ok(text) => EventDraft::new(EventKind::WorkerCompleted).payload(json!({
            "elapsed_ms": elapsed.as_millis() as u64,
            "bytes": text.len(),
        })),
        Err(e) => {
            warn!(step = step_name, worker = %worker_id, error = %e, "Worker failed");
            EventDraft::new(EventKind::WorkerFailed).payload(json!({
                "elapsed_ms": elapsed.as_millis() as u64,
                "error": e.to_string(),
                "timeout": e.is_timeout(),
            }))
        }
    };
    ctx.bus.publish(draft.step(step_name).worker(worker_id.clone()));
}
