//! Shared run state.

use super::history::{Message, MessageHistory, Role};
use super::view::{MemoryWrite, ViewGrant, WorkerView};
use crate::core::worker_id::WorkerId;
use crate::orchestration::step_result::StepResult;
use crate::voting::decision::Decision;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Lifetime of a memory value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Lives for the whole run
    #[default]
    Global,
    /// Cleared when the next step result is committed
    Step,
}

/// Shared state of one run
///
/// Only the orchestrator mutates a `Context`. Workers get a [`WorkerView`]
/// instead. The message history never holds more than its window: every
/// method here that appends enforces it on its own.
#[derive(Debug, Clone)]
pub struct Context {
    global: BTreeMap<String, serde_json::Value>,
    step: BTreeMap<String, serde_json::Value>,
    history: MessageHistory,
    results: Vec<StepResult>,
    decisions: Vec<Decision>,
}

impl Context {
    pub fn new(max_history: usize) -> Self {
        Self {
            global: BTreeMap::new(),
            step: BTreeMap::new(),
            history: MessageHistory::new(max_history),
            results: Vec::new(),
            decisions: Vec::new(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value, scope: Scope) {
        let key = key.into();
        match scope {
            Scope::Global => {
                self.global.insert(key, value);
            }
            Scope::Step => {
                self.step.insert(key, value);
            }
        }
    }

    /// Step scope shadows global scope
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.step.get(key).or_else(|| self.global.get(key))
    }

    pub fn get_or(&self, key: &str, default: serde_json::Value) -> serde_json::Value {
        self.get(key).cloned().unwrap_or(default)
    }

    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    /// Append a message, dropping the oldest entries if the window is full.
    ///
    /// Returns how many entries were dropped.
    pub fn push_message(&mut self, role: Role, content: impl Into<String>) -> usize {
        self.history.push_truncating(Message::new(role, content))
    }

    /// Replace the oldest `n` history entries with one summary entry
    pub fn fold_history(&mut self, n: usize, summary: impl Into<String>) -> usize {
        self.history.fold_oldest(n, summary)
    }

    /// Drop oldest history entries until the content fits in `max_bytes`
    pub fn truncate_history_to_bytes(&mut self, max_bytes: usize) -> usize {
        self.history.truncate_to_bytes(max_bytes)
    }

    /// Commit a step result. Step-scoped memory ends here.
    pub fn record_result(&mut self, result: StepResult) {
        self.step.clear();
        self.results.push(result);
    }

    pub fn record_decision(&mut self, decision: Decision) {
        self.decisions.push(decision);
    }

    /// Merge buffered view writes in the given order
    pub fn apply_writes(&mut self, writes: impl IntoIterator<Item = MemoryWrite>) -> usize {
        let mut applied = 0;
        for write in writes {
            self.set(write.key, write.value, write.scope);
            applied += 1;
        }
        applied
    }

    pub fn results(&self) -> &[StepResult] {
        &self.results
    }

    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }

    pub fn last_result(&self) -> Option<&StepResult> {
        self.results.last()
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            memory: self.global.clone(),
            step_memory: self.step.clone(),
            history: self.history.as_slice().to_vec(),
            results: self.results.clone(),
            decisions: self.decisions.clone(),
        }
    }

    pub fn fork_for_worker(&self, worker_id: WorkerId, grant: ViewGrant) -> WorkerView {
        WorkerView::new(worker_id, Arc::new(self.snapshot()), grant)
    }

    /// Fork one view per worker over a single shared snapshot
    pub fn fork_all(&self, workers: &[WorkerId], grant: &ViewGrant) -> Vec<WorkerView> {
        let snapshot = Arc::new(self.snapshot());
        workers
            .iter()
            .map(|id| WorkerView::new(id.clone(), Arc::clone(&snapshot), grant.clone()))
            .collect()
    }
}

/// Serializable copy of a context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub memory: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub step_memory: BTreeMap<String, serde_json::Value>,
    pub history: Vec<Message>,
    pub results: Vec<StepResult>,
    pub decisions: Vec<Decision>,
}

impl ContextSnapshot {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.step_memory.get(key).or_else(|| self.memory.get(key))
    }
}
