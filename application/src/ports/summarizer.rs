//! Summarizer port
//!
//! Folds old history entries into one synthetic entry when the context
//! window overflows.

use async_trait::async_trait;
use council_domain::Message;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SummarizerError {
    #[error("Summarizer failed: {0}")]
    Failed(String),

    #[error("Summarizer returned an empty summary")]
    Empty,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `messages` (oldest first) into one text
    async fn summarize(&self, messages: &[Message]) -> Result<String, SummarizerError>;
}
