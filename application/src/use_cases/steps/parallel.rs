//! Parallel step: every worker answers independently.
//!
//! Workers never see each other's answers; each gets a view forked before
//! dispatch. The task can be specialized per worker by a
//! [`TaskSpecializer`] (identical by default).

use super::dispatch::{Assignment, fan_out};
use super::{StepContext, StepError, StepOutcome, validate_worker_ids};
use crate::ports::worker::Worker;
use council_domain::split::balanced_chunks;
use council_domain::{StepOutput, StepResult, StepStatus, ViewGrant, WorkerId, WorkerOutcome};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Turns one task into one task per worker
pub trait TaskSpecializer: Send + Sync {
    fn name(&self) -> &'static str;

    /// One task per worker, in worker order
    fn specialize(&self, task: &str, workers: &[WorkerId]) -> Vec<String>;
}

/// Every worker gets the same task
#[derive(Debug, Clone, Copy, Default)]
pub struct IdenticalTask;

impl TaskSpecializer for IdenticalTask {
    fn name(&self) -> &'static str {
        "identical"
    }

    fn specialize(&self, task: &str, workers: &[WorkerId]) -> Vec<String> {
        vec![task.to_string(); workers.len()]
    }
}

/// Each worker answers from a different perspective, assigned round-robin
#[derive(Debug, Clone)]
pub struct Perspectives {
    perspectives: Vec<String>,
}

impl Default for Perspectives {
    fn default() -> Self {
        Self::new(["technical", "business", "user", "security"])
    }
}

impl Perspectives {
    pub fn new<I, S>(perspectives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            perspectives: perspectives.into_iter().map(Into::into).collect(),
        }
    }
}

impl TaskSpecializer for Perspectives {
    fn name(&self) -> &'static str {
        "perspectives"
    }

    fn specialize(&self, task: &str, workers: &[WorkerId]) -> Vec<String> {
        if self.perspectives.is_empty() {
            return IdenticalTask.specialize(task, workers);
        }
        (0..workers.len())
            .map(|i| {
                let perspective = &self.perspectives[i % self.perspectives.len()];
                format!("{}\n\nAnswer from a {} perspective.", task, perspective)
            })
            .collect()
    }
}

/// The task's lines are split into contiguous chunks, one per worker
#[derive(Debug, Clone, Copy, Default)]
pub struct LineChunks;

impl TaskSpecializer for LineChunks {
    fn name(&self) -> &'static str {
        "line_chunks"
    }

    fn specialize(&self, task: &str, workers: &[WorkerId]) -> Vec<String> {
        let lines: Vec<&str> = task.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.len() < workers.len() {
            return IdenticalTask.specialize(task, workers);
        }
        balanced_chunks(&lines, workers.len())
            .into_iter()
            .map(|chunk| chunk.join("\n"))
            .collect()
    }
}

/// Capability above which a worker is asked for a comprehensive answer
pub const DEFAULT_CAPABILITY_THRESHOLD: f64 = 0.7;

/// Unrated workers count as fully capable
const DEFAULT_CAPABILITY: f64 = 1.0;

/// Sizes each worker's share by its capability level.
///
/// Workers rated above the threshold get the task with a request for a
/// comprehensive analysis; the rest are asked to focus on key points.
#[derive(Debug, Clone)]
pub struct Capabilities {
    levels: HashMap<WorkerId, f64>,
    threshold: f64,
}

impl Capabilities {
    pub fn new<I>(levels: I) -> Self
    where
        I: IntoIterator<Item = (WorkerId, f64)>,
    {
        Self {
            levels: levels.into_iter().collect(),
            threshold: DEFAULT_CAPABILITY_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn level(&self, worker: &WorkerId) -> f64 {
        self.levels.get(worker).copied().unwrap_or(DEFAULT_CAPABILITY)
    }
}

impl TaskSpecializer for Capabilities {
    fn name(&self) -> &'static str {
        "capabilities"
    }

    fn specialize(&self, task: &str, workers: &[WorkerId]) -> Vec<String> {
        workers
            .iter()
            .map(|worker| {
                if self.level(worker) > self.threshold {
                    format!("{}\n\nProvide a comprehensive analysis.", task)
                } else {
                    format!("{}\n\nFocus on the key points.", task)
                }
            })
            .collect()
    }
}

pub struct ParallelStep {
    pub name: String,
    pub workers: Vec<Arc<dyn Worker>>,
    pub specializer: Arc<dyn TaskSpecializer>,
    pub grant: ViewGrant,
}

impl ParallelStep {
    pub fn new(name: impl Into<String>, workers: Vec<Arc<dyn Worker>>) -> Self {
        Self {
            name: name.into(),
            workers,
            specializer: Arc::new(IdenticalTask),
            grant: ViewGrant::default(),
        }
    }

    pub fn with_specializer(mut self, specializer: Arc<dyn TaskSpecializer>) -> Self {
        self.specializer = specializer;
        self
    }

    pub fn with_grant(mut self, grant: ViewGrant) -> Self {
        self.grant = grant;
        self
    }

    pub(super) fn validate(&self) -> Result<(), StepError> {
        validate_worker_ids(&self.name, self.workers.iter().map(|w| w.id()), 1)
    }

    pub(super) async fn execute(
        &self,
        task: &str,
        ctx: &StepContext<'_>,
    ) -> Result<StepOutcome, StepError> {
        let ids: Vec<WorkerId> = self.workers.iter().map(|w| w.id().clone()).collect();
        let tasks = self.specializer.specialize(task, &ids);
        let views = ctx.context.fork_all(&ids, &self.grant);

        let assignments = self
            .workers
            .iter()
            .zip(tasks)
            .zip(views)
            .map(|((worker, task), view)| Assignment::new(Arc::clone(worker), task, view))
            .collect();
        let settled = fan_out(&self.name, assignments, ctx).await?;

        let failed = settled.iter().filter(|s| !s.is_ok()).count();
        if failed == settled.len() {
            return Err(StepError::AllWorkersFailed {
                step: self.name.clone(),
                count: failed,
            });
        }

        let mut writes = Vec::new();
        let mut outcomes = Vec::with_capacity(settled.len());
        for s in settled {
            writes.extend(s.view.take_writes());
            let outcome = match s.outcome {
                Ok(text) => WorkerOutcome::Ok { text },
                Err(e) => WorkerOutcome::Failed {
                    error: e.to_string(),
                },
            };
            outcomes.push((s.worker_id, outcome));
        }

        let status = if failed == 0 {
            StepStatus::Success
        } else {
            StepStatus::Partial
        };
        info!(step = %self.name, workers = outcomes.len(), failed, "Parallel step settled");

        let mut result = StepResult::new(&self.name, status, StepOutput::PerWorker(Vec::new()))
            .with_metadata("specializer", json!(self.specializer.name()))
            .with_metadata("failed", json!(failed));
        for (worker, outcome) in &outcomes {
            result
                .contributions
                .insert(worker.clone(), outcome.contribution());
        }
        result.output = StepOutput::PerWorker(outcomes);

        Ok(StepOutcome::new(result).with_writes(writes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, ScriptedWorker};
    use council_domain::FAILURE_MARKER;
    use std::time::Duration;
    use tokio::time::Instant;

    fn workers(list: Vec<ScriptedWorker>) -> Vec<Arc<dyn Worker>> {
        list.into_iter().map(|w| Arc::new(w) as Arc<dyn Worker>).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_one_call_not_the_sum() {
        const M: usize = 8;
        let latency = Duration::from_millis(500);
        let harness = Harness::new();
        let list = (0..M)
            .map(|i| ScriptedWorker::echo(&format!("w{}", i)).with_delay(latency))
            .collect();
        let step = ParallelStep::new("fan", workers(list));

        let started = Instant::now();
        let outcome = step.execute("task", &harness.ctx()).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(outcome.result.status, StepStatus::Success);
        assert!(elapsed >= latency);
        assert!(elapsed < latency * 2, "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_partial_when_some_fail() {
        let harness = Harness::new();
        let step = ParallelStep::new(
            "review",
            workers(vec![
                ScriptedWorker::fixed("a", "looks good"),
                ScriptedWorker::failing("b", "rate limited"),
            ]),
        );

        let outcome = step.execute("review", &harness.ctx()).await.unwrap();
        let result = outcome.result;
        assert_eq!(result.status, StepStatus::Partial);
        assert_eq!(result.contributions[&WorkerId::new("a")], "looks good");
        assert!(result.contributions[&WorkerId::new("b")].starts_with(FAILURE_MARKER));
        match result.output {
            StepOutput::PerWorker(outcomes) => {
                assert_eq!(outcomes.len(), 2);
                assert!(outcomes[0].1.is_ok());
                assert!(!outcomes[1].1.is_ok());
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_all_failed_is_a_step_error() {
        let harness = Harness::new();
        let step = ParallelStep::new(
            "review",
            workers(vec![
                ScriptedWorker::failing("a", "x"),
                ScriptedWorker::failing("b", "y"),
            ]),
        );
        let err = step.execute("t", &harness.ctx()).await.unwrap_err();
        assert!(matches!(err, StepError::AllWorkersFailed { count: 2, .. }));
    }

    #[tokio::test]
    async fn test_perspectives_specialize_each_worker() {
        let harness = Harness::new();
        let step = ParallelStep::new(
            "views",
            workers(vec![
                ScriptedWorker::echo("a"),
                ScriptedWorker::echo("b"),
                ScriptedWorker::echo("c"),
            ]),
        )
        .with_specializer(Arc::new(Perspectives::new(["technical", "user"])));

        let outcome = step.execute("Pick a database", &harness.ctx()).await.unwrap();
        let contributions = &outcome.result.contributions;
        assert!(contributions[&WorkerId::new("a")].contains("technical perspective"));
        assert!(contributions[&WorkerId::new("b")].contains("user perspective"));
        assert!(contributions[&WorkerId::new("c")].contains("technical perspective"));
        assert_eq!(outcome.result.metadata["specializer"], json!("perspectives"));
    }

    #[test]
    fn test_line_chunks() {
        let ids = vec![WorkerId::new("a"), WorkerId::new("b")];
        let tasks = LineChunks.specialize("one\ntwo\n\nthree", &ids);
        assert_eq!(tasks, vec!["one\ntwo", "three"]);

        let tasks = LineChunks.specialize("single line", &ids);
        assert_eq!(tasks, vec!["single line", "single line"]);
    }

    #[test]
    fn test_capabilities_size_the_ask() {
        let ids = vec![WorkerId::new("senior"), WorkerId::new("junior"), WorkerId::new("new")];
        let specializer = Capabilities::new([
            (WorkerId::new("senior"), 0.9),
            (WorkerId::new("junior"), 0.4),
        ]);
        let tasks = specializer.specialize("Audit the cache", &ids);
        assert!(tasks[0].ends_with("Provide a comprehensive analysis."));
        assert!(tasks[1].ends_with("Focus on the key points."));
        // unrated workers count as fully capable
        assert!(tasks[2].ends_with("Provide a comprehensive analysis."));
        assert!(tasks.iter().all(|t| t.starts_with("Audit the cache")));

        let strict = specializer.with_threshold(0.95);
        assert!(strict.specialize("t", &ids[..1])[0].ends_with("Focus on the key points."));
    }

    #[test]
    fn test_validate_rejects_empty_and_duplicates() {
        let empty = ParallelStep::new("p", Vec::new());
        assert!(empty.validate().is_err());
        let dup = ParallelStep::new(
            "p",
            workers(vec![ScriptedWorker::echo("a"), ScriptedWorker::echo("a")]),
        );
        assert!(dup.validate().is_err());
    }
}
