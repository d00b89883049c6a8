//! History window maintenance with summarization.
//!
//! The domain [`Context`] keeps its history window on its own by dropping
//! the oldest entries. [`ContextWindow`] is the path the orchestrator uses
//! instead: before anything is dropped it asks the [`Summarizer`] to fold
//! the entries into one synthetic summary entry, and only truncates (with a
//! `context_overflow_warning` event) when that is not possible.

use crate::events::EventBus;
use crate::ports::summarizer::Summarizer;
use council_domain::{Context, EventDraft, EventKind, Role};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// What happened to the history when a message was added
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOutcome {
    /// Appended without overflow
    Appended,
    /// Oldest entries were folded into one summary entry
    Summarized { folded: usize },
    /// Oldest entries were dropped
    Truncated { dropped: usize },
}

pub struct ContextWindow {
    summarizer: Option<Arc<dyn Summarizer>>,
}

impl ContextWindow {
    pub fn new() -> Self {
        Self { summarizer: None }
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn has_summarizer(&self) -> bool {
        self.summarizer.is_some()
    }

    /// Append a message, keeping `len(history) <= max_history`.
    ///
    /// On overflow by `k`, the oldest `k + 1` entries are summarized into
    /// one entry so the new message fits. Without a working summarizer the
    /// oldest `k` entries are dropped and a warning event is published.
    pub async fn add_message(
        &self,
        context: &mut Context,
        bus: &EventBus,
        role: Role,
        content: impl Into<String>,
    ) -> WindowOutcome {
        let content = content.into();
        let overflow = context.history().overflow_if_appended();
        if overflow == 0 {
            context.push_message(role, content);
            return WindowOutcome::Appended;
        }

        let fold = overflow + 1;
        let reason = match self.fold(context, fold).await {
            Ok(()) => {
                context.push_message(role, content);
                bus.publish(EventDraft::new(EventKind::ContextSummarized).payload(json!({
                    "folded": fold,
                    "history_len": context.history().len(),
                })));
                return WindowOutcome::Summarized { folded: fold };
            }
            Err(reason) => reason,
        };

        let dropped = context.push_message(role, content);
        warn!(dropped, reason = %reason, "Context history truncated");
        bus.publish(
            EventDraft::new(EventKind::ContextOverflowWarning)
                .payload(json!({ "dropped": dropped, "reason": reason })),
        );
        WindowOutcome::Truncated { dropped }
    }

    /// Shrink the history when its content exceeds `threshold_bytes`.
    ///
    /// The older half is folded into one summary entry. Without a working
    /// summarizer the oldest entries are dropped until the history fits.
    /// Returns whether the history changed.
    pub async fn summarize_if_large(
        &self,
        context: &mut Context,
        bus: &EventBus,
        threshold_bytes: usize,
    ) -> bool {
        let before = context.history().byte_size();
        if before <= threshold_bytes {
            return false;
        }

        let half = (context.history().len() / 2).max(1);
        let reason = match self.fold(context, half).await {
            Ok(()) => {
                let after = context.history().byte_size();
                debug!(folded = half, before, after, "Context history summarized");
                bus.publish(EventDraft::new(EventKind::ContextSummarized).payload(json!({
                    "folded": half,
                    "bytes_before": before,
                    "bytes_after": after,
                })));
                return true;
            }
            Err(reason) => reason,
        };

        let dropped = context.truncate_history_to_bytes(threshold_bytes);
        if dropped > 0 {
            warn!(dropped, reason = %reason, "Context history truncated to size");
            bus.publish(EventDraft::new(EventKind::ContextOverflowWarning).payload(json!({
                "dropped": dropped,
                "reason": reason,
                "bytes_before": before,
            })));
        }
        dropped > 0
    }

    /// Replace the oldest `n` entries with a summary, or explain why not
    async fn fold(&self, context: &mut Context, n: usize) -> Result<(), String> {
        let Some(summarizer) = &self.summarizer else {
            return Err("no summarizer configured".to_string());
        };
        let victims = context.history().oldest(n).to_vec();
        match summarizer.summarize(&victims).await {
            Ok(summary) if !summary.trim().is_empty() => {
                context.fold_history(victims.len(), summary);
                Ok(())
            }
            Ok(_) => Err("summarizer returned an empty summary".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self::new()
    }
}
