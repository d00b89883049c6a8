//! Permissioned per-worker projection of the context.
//!
//! A [`WorkerView`] is what a worker sees while it runs. It reads a snapshot
//! taken when the view was forked, so concurrent workers never observe each
//! other. Writes are checked against the view's [`ViewGrant`] and buffered;
//! only the orchestrator applies them to the real context, after the
//! fan-out has joined.

use super::entities::{ContextSnapshot, Scope};
use super::history::Message;
use crate::core::error::DomainError;
use crate::core::worker_id::WorkerId;
use crate::orchestration::step_result::StepResult;
use crate::voting::decision::Decision;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Which memory keys a view may write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryGrant {
    None,
    #[default]
    All,
    Keys(BTreeSet<String>),
}

impl MemoryGrant {
    pub fn allows(&self, key: &str) -> bool {
        match self {
            MemoryGrant::None => false,
            MemoryGrant::All => true,
            MemoryGrant::Keys(keys) => keys.contains(key),
        }
    }
}

/// The writable set of a view. Decisions and step results are never writable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewGrant {
    pub memory: MemoryGrant,
    pub proposal: bool,
}

impl Default for ViewGrant {
    fn default() -> Self {
        Self {
            memory: MemoryGrant::All,
            proposal: true,
        }
    }
}

impl ViewGrant {
    pub fn read_only() -> Self {
        Self {
            memory: MemoryGrant::None,
            proposal: false,
        }
    }

    pub fn with_memory_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.memory = MemoryGrant::Keys(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn without_memory(mut self) -> Self {
        self.memory = MemoryGrant::None;
        self
    }

    pub fn without_proposal(mut self) -> Self {
        self.proposal = false;
        self
    }
}

/// A buffered memory write waiting to be merged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryWrite {
    pub worker_id: WorkerId,
    pub key: String,
    pub value: serde_json::Value,
    pub scope: Scope,
}

#[derive(Debug, Default)]
struct Pending {
    memory: Vec<MemoryWrite>,
    proposal: Option<String>,
}

#[derive(Debug)]
pub struct WorkerView {
    worker_id: WorkerId,
    snapshot: Arc<ContextSnapshot>,
    grant: ViewGrant,
    pending: Mutex<Pending>,
}

impl WorkerView {
    pub fn new(worker_id: WorkerId, snapshot: Arc<ContextSnapshot>, grant: ViewGrant) -> Self {
        Self {
            worker_id,
            snapshot,
            grant,
            pending: Mutex::new(Pending::default()),
        }
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    pub fn grant(&self) -> &ViewGrant {
        &self.grant
    }

    pub fn decisions(&self) -> &[Decision] {
        &self.snapshot.decisions
    }

    pub fn results(&self) -> &[StepResult] {
        &self.snapshot.results
    }

    pub fn history(&self) -> &[Message] {
        &self.snapshot.history
    }

    /// Read a memory value. The view's own pending writes are visible to it.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let own = self
            .lock()
            .memory
            .iter()
            .rev()
            .find(|w| w.key == key)
            .map(|w| w.value.clone());
        own.or_else(|| self.snapshot.get(key).cloned())
    }

    pub fn set(
        &self,
        key: impl Into<String>,
        value: serde_json::Value,
        scope: Scope,
    ) -> Result<(), DomainError> {
        let key = key.into();
        if !self.grant.memory.allows(&key) {
            return Err(DomainError::PermissionDenied {
                worker: self.worker_id.to_string(),
                area: format!("memory key '{}'", key),
            });
        }
        self.lock().memory.push(MemoryWrite {
            worker_id: self.worker_id.clone(),
            key,
            value,
            scope,
        });
        Ok(())
    }

    /// Write the worker-local proposal slot
    pub fn propose(&self, text: impl Into<String>) -> Result<(), DomainError> {
        if !self.grant.proposal {
            return Err(DomainError::PermissionDenied {
                worker: self.worker_id.to_string(),
                area: "proposal slot".to_string(),
            });
        }
        self.lock().proposal = Some(text.into());
        Ok(())
    }

    pub fn proposal(&self) -> Option<String> {
        self.lock().proposal.clone()
    }

    /// Drain the buffered memory writes, in write order
    pub fn take_writes(&self) -> Vec<MemoryWrite> {
        std::mem::take(&mut self.lock().memory)
    }

    /// Drain the proposal slot
    pub fn take_proposal(&self) -> Option<String> {
        self.lock().proposal.take()
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        // the buffer stays consistent even if a writer panicked
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::entities::Context;
    use serde_json::json;

    fn view(grant: ViewGrant) -> WorkerView {
        let mut context = Context::new(10);
        context.set("plan", json!("v1"), Scope::Global);
        context.fork_for_worker(WorkerId::new("a"), grant)
    }

    #[test]
    fn test_reads_snapshot_and_own_writes() {
        let view = view(ViewGrant::default());
        assert_eq!(view.get("plan"), Some(json!("v1")));

        view.set("plan", json!("v2"), Scope::Step).unwrap();
        assert_eq!(view.get("plan"), Some(json!("v2")));
        assert_eq!(view.get("missing"), None);
    }

    #[test]
    fn test_read_only_view_rejects_writes() {
        let view = view(ViewGrant::read_only());
        let err = view.set("plan", json!(1), Scope::Global).unwrap_err();
        assert!(err.is_permission_denied());
        assert!(view.propose("x").unwrap_err().is_permission_denied());
        assert!(view.take_writes().is_empty());
    }

    #[test]
    fn test_key_allow_list() {
        let view = view(ViewGrant::default().with_memory_keys(["notes"]));
        assert!(view.set("notes", json!("ok"), Scope::Global).is_ok());
        assert!(view.set("plan", json!("no"), Scope::Global).is_err());

        let writes = view.take_writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].key, "notes");
        assert_eq!(writes[0].worker_id, WorkerId::new("a"));
    }

    #[test]
    fn test_proposal_slot() {
        let view = view(ViewGrant::default().without_memory());
        view.propose("first").unwrap();
        view.propose("second").unwrap();
        assert_eq!(view.proposal().as_deref(), Some("second"));
        assert_eq!(view.take_proposal().as_deref(), Some("second"));
        assert_eq!(view.proposal(), None);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_context_changes() {
        let mut context = Context::new(10);
        context.set("k", json!(1), Scope::Global);
        let view = context.fork_for_worker(WorkerId::new("a"), ViewGrant::default());
        context.set("k", json!(2), Scope::Global);
        assert_eq!(view.get("k"), Some(json!(1)));
    }
}
