//! Failure policy configuration from TOML (`[policy]` section)

use super::{ConfigIssue, Severity};
use council_application::{PolicyKind, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw failure policy
///
/// # Example
///
/// ```toml
/// [policy]
/// kind = "retry"                 # "halt", "continue", "retry", "fallback"
/// attempts = 3
/// base_delay_ms = 500
/// max_delay_ms = 30000
/// fallback_command = "cat canned-answer.txt"
/// ```
///
/// Steps may override `kind` with their own `policy` field; the retry
/// parameters and fallback command are shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePolicyConfig {
    pub kind: String,
    pub attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub fallback_command: Option<String>,
}

impl Default for FilePolicyConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            kind: "halt".to_string(),
            attempts: retry.max_attempts,
            base_delay_ms: retry.base_delay.as_millis() as u64,
            max_delay_ms: retry.max_delay.as_millis() as u64,
            fallback_command: None,
        }
    }
}

impl FilePolicyConfig {
    /// Parse a policy name, returning warnings on failure.
    ///
    /// Unknown names fall back to halt. So does `fallback` without a
    /// `fallback_command`, since there is nothing to fall back to.
    pub fn parse_kind(&self, field: &str, value: &str) -> (PolicyKind, Vec<ConfigIssue>) {
        match value.parse::<PolicyKind>() {
            Ok(PolicyKind::Fallback) if self.fallback_command.is_none() => (
                PolicyKind::Halt,
                vec![ConfigIssue::new(
                    Severity::Warning,
                    field,
                    "policy 'fallback' needs policy.fallback_command, falling back to 'halt'",
                )],
            ),
            Ok(kind) => (kind, vec![]),
            Err(_) => (
                PolicyKind::Halt,
                vec![ConfigIssue::new(
                    Severity::Warning,
                    field,
                    format!("unknown value '{}', falling back to 'halt'", value),
                )],
            ),
        }
    }

    pub fn parse_default_kind(&self) -> (PolicyKind, Vec<ConfigIssue>) {
        self.parse_kind("policy.kind", &self.kind)
    }

    pub fn to_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.attempts, Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
    }
}
