//! Split step: one fresh worker per work item.

use super::dispatch::{Assignment, fan_out};
use super::{StepContext, StepError, StepOutcome};
use crate::ports::worker::{Worker, WorkerTemplate};
use council_domain::split::validate_bounds;
use council_domain::{
    AutoSplitter, ItemOutput, StepOutput, StepResult, StepStatus, TaskSplitter, ViewGrant,
    WorkerOutcome,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub struct SplitStep {
    pub name: String,
    pub template: Arc<dyn WorkerTemplate>,
    pub splitter: Arc<dyn TaskSplitter>,
    pub min_workers: usize,
    pub max_workers: usize,
    pub grant: ViewGrant,
}

impl SplitStep {
    pub fn new(name: impl Into<String>, template: Arc<dyn WorkerTemplate>) -> Self {
        Self {
            name: name.into(),
            template,
            splitter: Arc::new(AutoSplitter),
            min_workers: 1,
            max_workers: 4,
            grant: ViewGrant::default(),
        }
    }

    pub fn with_splitter(mut self, splitter: Arc<dyn TaskSplitter>) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn with_bounds(mut self, min_workers: usize, max_workers: usize) -> Self {
        self.min_workers = min_workers;
        self.max_workers = max_workers;
        self
    }

    pub(super) fn validate(&self) -> Result<(), StepError> {
        validate_bounds(self.min_workers, self.max_workers)
            .map_err(|e| StepError::validation(&self.name, e.to_string()))
    }

    pub(super) async fn execute(
        &self,
        task: &str,
        ctx: &StepContext<'_>,
    ) -> Result<StepOutcome, StepError> {
        let plan = self.splitter.split(task, self.min_workers, self.max_workers);
        info!(
            step = %self.name,
            splitter = self.splitter.name(),
            items = plan.len(),
            "Task split into work items"
        );

        let workers: Vec<Arc<dyn Worker>> = (1..=plan.len())
            .map(|i| self.template.instantiate(self.template.name().derived(i)))
            .collect();
        let ids: Vec<_> = workers.iter().map(|w| w.id().clone()).collect();
        let views = ctx.context.fork_all(&ids, &self.grant);

        let assignments = workers
            .iter()
            .zip(&plan.items)
            .zip(views)
            .map(|((worker, item), view)| Assignment::new(Arc::clone(worker), item.clone(), view))
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
        let mut items = Vec::with_capacity(settled.len());
        for (index, (s, item)) in settled.into_iter().zip(plan.items).enumerate() {
            writes.extend(s.view.take_writes());
            let outcome = match s.outcome {
                Ok(text) => WorkerOutcome::Ok { text },
                Err(e) => WorkerOutcome::Failed {
                    error: e.to_string(),
                },
            };
            items.push(ItemOutput {
                index,
                worker_id: s.worker_id,
                item,
                outcome,
            });
        }

        let status = if failed == 0 {
            StepStatus::Success
        } else {
            StepStatus::Partial
        };
        let mut result = StepResult::new(&self.name, status, StepOutput::None)
            .with_metadata("splitter", json!(self.splitter.name()))
            .with_metadata("signal", json!(plan.signal))
            .with_metadata("items", json!(items.len()))
            .with_metadata("failed", json!(failed));
        for item in &items {
            result
                .contributions
                .insert(item.worker_id.clone(), item.outcome.contribution());
        }
        result.output = StepOutput::Items(items);

        Ok(StepOutcome::new(result).with_writes(writes))
    }
}
