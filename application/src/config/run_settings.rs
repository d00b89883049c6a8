//! Run settings: orchestrator and step loop control.
//!
//! [`RunSettings`] groups the static parameters of one run: the history
//! window, summarization threshold, per-call worker timeout and event bus
//! sizing. These are application-layer concerns, not domain policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    /// Maximum entries in the context's message history.
    pub max_history: usize,
    /// Summarize history after a step once it exceeds this many bytes.
    pub summarize_threshold_bytes: Option<usize>,
    /// Timeout applied to every worker call.
    pub worker_timeout: Option<Duration>,
    /// Per-subscriber event queue length.
    pub event_capacity: usize,
    /// Events kept for replay.
    pub event_retain: usize,
    /// Bytes of step output copied into the history message of a step.
    pub history_preview_bytes: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_history: 50,
            summarize_threshold_bytes: Some(32 * 1024),
            worker_timeout: Some(Duration::from_secs(300)),
            event_capacity: 256,
            event_retain: 1024,
            history_preview_bytes: 4 * 1024,
        }
    }
}

impl RunSettings {
    // ==================== Builder Methods ====================

    pub fn with_max_history(mut self, max: usize) -> Self {
        self.max_history = max;
        self
    }

    pub fn with_summarize_threshold(mut self, bytes: Option<usize>) -> Self {
        self.summarize_threshold_bytes = bytes;
        self
    }

    pub fn with_worker_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.worker_timeout = timeout;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn with_event_retain(mut self, retain: usize) -> Self {
        self.event_retain = retain;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let settings = RunSettings::default();
        assert_eq!(settings.max_history, 50);
        assert_eq!(settings.event_capacity, 256);
        assert!(settings.worker_timeout.is_some());
        assert!(settings.summarize_threshold_bytes.is_some());
    }

    #[test]
    fn test_builder() {
        let settings = RunSettings::default()
            .with_max_history(8)
            .with_worker_timeout(None)
            .with_summarize_threshold(None);

        assert_eq!(settings.max_history, 8);
        assert!(settings.worker_timeout.is_none());
        assert!(settings.summarize_threshold_bytes.is_none());
    }
}
