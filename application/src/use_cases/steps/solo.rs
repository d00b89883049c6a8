//! Solo step: one worker, one answer.

use super::dispatch::{Assignment, fan_out};
use super::{StepContext, StepError, StepOutcome};
use crate::ports::worker::Worker;
use council_domain::{StepOutput, StepResult, ViewGrant};
use std::sync::Arc;

pub struct SoloStep {
    pub name: String,
    pub worker: Arc<dyn Worker>,
    pub grant: ViewGrant,
}

impl SoloStep {
    pub fn new(name: impl Into<String>, worker: Arc<dyn Worker>) -> Self {
        Self {
            name: name.into(),
            worker,
            grant: ViewGrant::default(),
        }
    }

    pub fn with_grant(mut self, grant: ViewGrant) -> Self {
        self.grant = grant;
        self
    }

    pub(super) async fn execute(
        &self,
        task: &str,
        ctx: &StepContext<'_>,
    ) -> Result<StepOutcome, StepError> {
        let view = ctx
            .context
            .fork_for_worker(self.worker.id().clone(), self.grant.clone());
        let assignment = Assignment::new(Arc::clone(&self.worker), task, view);

        let mut settled = fan_out(&self.name, vec![assignment], ctx).await?;
        let Some(settled) = settled.pop() else {
            return Err(StepError::AllWorkersFailed {
                step: self.name.clone(),
                count: 1,
            });
        };

        match settled.outcome {
            Ok(text) => {
                let result = StepResult::success(&self.name, StepOutput::Text(text.clone()))
                    .with_contribution(settled.worker_id, text);
                Ok(StepOutcome::new(result).with_writes(settled.view.take_writes()))
            }
            Err(source) => Err(StepError::WorkerAborted {
                step: self.name.clone(),
                worker: settled.worker_id,
                source,
            }),
        }
    }
}
