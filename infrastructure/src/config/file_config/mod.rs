//! TOML-backed configuration types.
//!
//! Each submodule owns one section of `council.toml`. Sections deserialize
//! leniently (`#[serde(default)]` everywhere); semantic problems are
//! reported by [`FileConfig::validate`] as [`ConfigIssue`]s instead of
//! failing the load.

mod log;
mod policy;
mod run;
mod steps;
mod workers;

pub use log::FileLogConfig;
pub use policy::FilePolicyConfig;
pub use run::FileRunConfig;
pub use steps::FileStepConfig;
pub use workers::{FileSummarizerConfig, FileWorkerConfig};

use council_application::StepKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The workflow cannot be built
    Error,
    /// A value was replaced by its default
    Warning,
}

/// One problem found while validating a configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigIssue {
    pub severity: Severity,
    /// Dotted path of the offending field
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    pub fn new(severity: Severity, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}: {}", level, self.field, self.message)
    }
}

/// Root of `council.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub run: FileRunConfig,
    pub policy: FilePolicyConfig,
    pub summarizer: FileSummarizerConfig,
    pub log: FileLogConfig,
    pub workers: Vec<FileWorkerConfig>,
    pub steps: Vec<FileStepConfig>,
}

impl FileConfig {
    pub fn worker(&self, id: &str) -> Option<&FileWorkerConfig> {
        self.workers.iter().find(|w| w.id == id)
    }

    /// Check the whole configuration, collecting every issue.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        // 1. Workers
        let mut seen = HashSet::new();
        for (index, worker) in self.workers.iter().enumerate() {
            let field = format!("workers[{}]", index);
            if worker.id.trim().is_empty() {
                issues.push(ConfigIssue::new(Severity::Error, &field, "id cannot be empty"));
            } else if !seen.insert(worker.id.as_str()) {
                issues.push(ConfigIssue::new(
                    Severity::Error,
                    &field,
                    format!("duplicate worker id '{}'", worker.id),
                ));
            }
            if worker.command.trim().is_empty() {
                issues.push(ConfigIssue::new(
                    Severity::Error,
                    &field,
                    format!("worker '{}' has no command", worker.id),
                ));
            }
        }

        // 2. Policy
        issues.extend(self.policy.parse_default_kind().1);
        if self.policy.attempts == 0 {
            issues.push(ConfigIssue::new(
                Severity::Warning,
                "policy.attempts",
                "attempts cannot be 0, using 1",
            ));
        }

        // 3. Moderator pool
        for id in &self.run.moderators {
            if self.worker(id).is_none() {
                issues.push(ConfigIssue::new(
                    Severity::Error,
                    "run.moderators",
                    format!("unknown worker '{}'", id),
                ));
            }
        }

        // 4. Steps
        if self.steps.is_empty() {
            issues.push(ConfigIssue::new(Severity::Warning, "steps", "no steps configured"));
        }
        let mut names = HashSet::new();
        for step in &self.steps {
            issues.extend(self.validate_step(step, &mut names));
        }

        issues
    }

    fn validate_step<'a>(
        &self,
        step: &'a FileStepConfig,
        names: &mut HashSet<&'a str>,
    ) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if step.name.trim().is_empty() {
            issues.push(ConfigIssue::new(Severity::Error, step.field("name"), "name cannot be empty"));
        } else if !names.insert(step.name.as_str()) {
            issues.push(ConfigIssue::new(
                Severity::Error,
                step.field("name"),
                format!("duplicate step name '{}'", step.name),
            ));
        }

        if let Some(policy) = &step.policy {
            issues.extend(self.policy.parse_kind(&step.field("policy"), policy).1);
        }

        for id in &step.workers {
            if self.worker(id).is_none() {
                issues.push(ConfigIssue::new(
                    Severity::Error,
                    step.field("workers"),
                    format!("unknown worker '{}'", id),
                ));
            }
        }

        let (kind, kind_issues) = step.parse_kind();
        issues.extend(kind_issues);
        let Some(kind) = kind else {
            return issues;
        };

        match kind {
            StepKind::Solo if step.workers.len() != 1 => issues.push(ConfigIssue::new(
                Severity::Error,
                step.field("workers"),
                format!("solo step needs exactly 1 worker, got {}", step.workers.len()),
            )),
            StepKind::Parallel => {
                if step.workers.is_empty() {
                    issues.push(ConfigIssue::new(
                        Severity::Error,
                        step.field("workers"),
                        "parallel step needs at least 1 worker",
                    ));
                }
                issues.extend(step.parse_specializer().1);
            }
            StepKind::Debate => {
                if step.workers.len() < 2 {
                    issues.push(ConfigIssue::new(
                        Severity::Error,
                        step.field("workers"),
                        format!("debate step needs at least 2 workers, got {}", step.workers.len()),
                    ));
                }
                issues.extend(step.voting_engine().1);
                if let Some(moderator) = &step.moderator
                    && self.worker(moderator).is_none()
                {
                    issues.push(ConfigIssue::new(
                        Severity::Error,
                        step.field("moderator"),
                        format!("unknown worker '{}'", moderator),
                    ));
                }
            }
            StepKind::Split => {
                match &step.template {
                    None => issues.push(ConfigIssue::new(
                        Severity::Error,
                        step.field("template"),
                        "split step needs a template worker",
                    )),
                    Some(template) if self.worker(template).is_none() => {
                        issues.push(ConfigIssue::new(
                            Severity::Error,
                            step.field("template"),
                            format!("unknown worker '{}'", template),
                        ))
                    }
                    Some(_) => {}
                }
                if step.min_workers == 0 || step.max_workers < step.min_workers {
                    issues.push(ConfigIssue::new(
                        Severity::Error,
                        step.field("max_workers"),
                        format!(
                            "invalid worker bounds {}..={}",
                            step.min_workers, step.max_workers
                        ),
                    ));
                }
                issues.extend(step.parse_splitter().1);
            }
            StepKind::Solo => {}
        }

        issues
    }
}
