//! Worker port
//!
//! Defines the capability every step dispatches to: take a task and a
//! context view, return text. Implementations (adapters) live in the
//! infrastructure layer.

use async_trait::async_trait;
use council_domain::{WorkerId, WorkerView};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during a worker call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkerError {
    #[error("Worker failed: {0}")]
    Failed(String),

    #[error("Worker timed out after {0:?}")]
    Timeout(Duration),

    #[error("Worker panicked: {0}")]
    Panicked(String),
}

impl WorkerError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, WorkerError::Timeout(_))
    }
}

/// A participant that answers tasks
///
/// Calls may fail or run past the caller's timeout. A call that has started
/// is never assumed to be cancelable; cancelled runs simply stop waiting.
#[async_trait]
pub trait Worker: Send + Sync {
    fn id(&self) -> &WorkerId;

    /// Answer `task`, reading (and within its grant, writing) through `view`
    async fn submit(&self, task: &str, view: &WorkerView) -> Result<String, WorkerError>;
}

/// Factory for fresh workers with the same configuration and independent state
pub trait WorkerTemplate: Send + Sync {
    /// Name split workers are derived from (`<name>#<i>`)
    fn name(&self) -> &WorkerId;

    fn instantiate(&self, id: WorkerId) -> Arc<dyn Worker>;
}
