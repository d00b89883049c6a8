//! History summarization and step fallback through shell commands.

use super::process::run_with_input;
use async_trait::async_trait;
use council_application::ports::fallback::{FallbackError, FallbackHandler};
use council_application::ports::summarizer::{Summarizer, SummarizerError};
use council_application::use_cases::steps::{Step, StepError};
use council_domain::{Context, Message, StepOutput, StepResult};

/// Pipes the rendered messages to a command; stdout is the summary
#[derive(Debug, Clone)]
pub struct CommandSummarizer {
    command: String,
}

impl CommandSummarizer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl Summarizer for CommandSummarizer {
    async fn summarize(&self, messages: &[Message]) -> Result<String, SummarizerError> {
        let input = messages
            .iter()
            .map(|m| m.render())
            .collect::<Vec<_>>()
            .join("\n\n");
        let count = messages.len().to_string();
        let output = run_with_input(&self.command, &input, &[("COUNCIL_MESSAGES", count.as_str())])
            .await
            .map_err(|e| SummarizerError::Failed(e.to_string()))?;

        let summary = output.trim();
        if summary.is_empty() {
            return Err(SummarizerError::Empty);
        }
        Ok(summary.to_string())
    }
}

/// Fallback policy handler that asks a command for a replacement answer.
///
/// The task goes to stdin; the failed step and its error are exported as
/// `COUNCIL_STEP` and `COUNCIL_ERROR`.
#[derive(Debug, Clone)]
pub struct CommandFallback {
    command: String,
}

impl CommandFallback {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl FallbackHandler for CommandFallback {
    async fn recover(
        &self,
        error: &StepError,
        step: &Step,
        task: &str,
        _context: &Context,
    ) -> Result<StepResult, FallbackError> {
        let error = error.to_string();
        let env = [("COUNCIL_STEP", step.name()), ("COUNCIL_ERROR", error.as_str())];
        let output = run_with_input(&self.command, task, &env)
            .await
            .map_err(|e| FallbackError(e.to_string()))?;

        let answer = output.trim();
        if answer.is_empty() {
            return Err(FallbackError("fallback command produced no output".to_string()));
        }
        Ok(StepResult::success(step.name(), StepOutput::Text(answer.to_string())))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use council_application::use_cases::steps::SoloStep;
    use crate::command::CommandWorker;
    use council_domain::{Role, WorkerId};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_summary_is_command_output() {
        let summarizer = CommandSummarizer::new("wc -l | tr -d ' '");
        let messages = vec![
            Message::new(Role::User, "one"),
            Message::new(Role::Worker, "two"),
        ];
        let summary = summarizer.summarize(&messages).await.unwrap();
        // two rendered messages separated by a blank line
        assert_eq!(summary, "2");
    }

    #[tokio::test]
    async fn test_empty_summary_is_rejected() {
        let summarizer = CommandSummarizer::new("cat > /dev/null");
        let err = summarizer
            .summarize(&[Message::new(Role::User, "x")])
            .await
            .unwrap_err();
        assert_eq!(err, SummarizerError::Empty);
    }

    #[tokio::test]
    async fn test_fallback_sees_step_and_error() {
        let step = Step::Solo(SoloStep::new(
            "draft",
            Arc::new(CommandWorker::new(WorkerId::new("w"), "cat")),
        ));
        let error = StepError::Cancelled("draft".to_string());
        let fallback = CommandFallback::new("printf '%s|' \"$COUNCIL_STEP\"; cat");

        let result = fallback
            .recover(&error, &step, "the task", &Context::new(4))
            .await
            .unwrap();
        assert_eq!(result.output, StepOutput::Text("draft|the task".to_string()));
    }
}
