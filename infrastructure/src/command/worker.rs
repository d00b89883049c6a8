//! Workers backed by shell commands.

use super::process::run_with_input;
use async_trait::async_trait;
use council_application::ports::worker::{Worker, WorkerError, WorkerTemplate};
use council_domain::core::string::truncate;
use council_domain::{WorkerId, WorkerView};
use std::sync::Arc;
use tracing::debug;

/// Bytes of each earlier result shown in the context preamble
const PREAMBLE_RESULT_BYTES: usize = 1024;

/// Runs `sh -c <command>` with the task on stdin; stdout is the answer.
///
/// When the worker's view holds earlier step results, a short context
/// preamble is written before the task. The worker id is exported as
/// `COUNCIL_WORKER_ID`.
#[derive(Debug, Clone)]
pub struct CommandWorker {
    id: WorkerId,
    command: String,
    include_context: bool,
}

impl CommandWorker {
    pub fn new(id: WorkerId, command: impl Into<String>) -> Self {
        Self {
            id,
            command: command.into(),
            include_context: true,
        }
    }

    pub fn without_context(mut self) -> Self {
        self.include_context = false;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn render_input(&self, task: &str, view: &WorkerView) -> String {
        if !self.include_context || view.results().is_empty() {
            return task.to_string();
        }
        let mut input = String::from("## Context\n");
        for result in view.results() {
            input.push_str(&format!(
                "\n### step:{} ({:?})\n{}\n",
                result.step_name,
                result.status,
                result.output.preview(PREAMBLE_RESULT_BYTES)
            ));
        }
        input.push_str("\n## Task\n");
        input.push_str(task);
        input
    }
}

#[async_trait]
impl Worker for CommandWorker {
    fn id(&self) -> &WorkerId {
        &self.id
    }

    async fn submit(&self, task: &str, view: &WorkerView) -> Result<String, WorkerError> {
        let input = self.render_input(task, view);
        let output = run_with_input(&self.command, &input, &[("COUNCIL_WORKER_ID", self.id.as_str())])
            .await
            .map_err(|e| WorkerError::Failed(e.to_string()))?;

        let answer = output.trim();
        if answer.is_empty() {
            return Err(WorkerError::Failed(format!(
                "'{}' produced no output",
                truncate(&self.command, 60)
            )));
        }
        debug!(worker = %self.id, bytes = answer.len(), "Command worker answered");
        Ok(answer.to_string())
    }
}

/// Template for split steps: every instance runs the same command
#[derive(Debug, Clone)]
pub struct CommandWorkerTemplate {
    name: WorkerId,
    command: String,
}

impl CommandWorkerTemplate {
    pub fn new(name: WorkerId, command: impl Into<String>) -> Self {
        Self {
            name,
            command: command.into(),
        }
    }
}

impl WorkerTemplate for CommandWorkerTemplate {
    fn name(&self) -> &WorkerId {
        &self.name
    }

    fn instantiate(&self, id: WorkerId) -> Arc<dyn Worker> {
        Arc::new(CommandWorker::new(id, self.command.clone()))
    }
}
