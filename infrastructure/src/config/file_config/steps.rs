//! Step configuration from TOML (`[[steps]]`)

use super::{ConfigIssue, Severity};
use council_application::{
    Capabilities, IdenticalTask, LineChunks, Perspectives, StepKind, TaskSpecializer,
};
use council_domain::{
    AutoSplitter, ConsensusSettings, FixedSplitter, TaskSplitter, ViewGrant, VotingEngine,
    VotingStrategy, WorkerId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One workflow step. Which fields matter depends on `kind`.
///
/// # Example
///
/// ```toml
/// [[steps]]
/// kind = "solo"
/// name = "draft"
/// workers = ["writer"]
///
/// [[steps]]
/// kind = "debate"
/// name = "review"
/// workers = ["writer", "critic", "editor"]
/// rounds = 2
/// strategy = "weighted"
/// weights = { critic = 1.8, editor = 0.5 }
///
/// [[steps]]
/// kind = "split"
/// name = "implement"
/// template = "coder"
/// min_workers = 2
/// max_workers = 6
/// split = "auto"                 # or "fixed"
///
/// [[steps]]
/// kind = "parallel"
/// name = "audit"
/// workers = ["critic", "editor"]
/// specializer = "capabilities"
/// capabilities = { critic = 0.9, editor = 0.4 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStepConfig {
    pub kind: String,
    pub name: String,
    pub workers: Vec<String>,

    // Debate
    pub rounds: u32,
    pub strategy: String,
    pub weights: BTreeMap<String, f64>,
    pub moderator: Option<String>,
    pub allow_self_vote: bool,
    pub consensus_prefix: Option<usize>,
    pub similarity: Option<f64>,

    // Split
    pub template: Option<String>,
    pub min_workers: usize,
    pub max_workers: usize,
    pub split: String,

    // Parallel
    pub specializer: String,
    pub perspectives: Vec<String>,
    /// Capability level per worker id for the `capabilities` specializer
    pub capabilities: BTreeMap<String, f64>,
    pub capability_threshold: Option<f64>,

    /// Overrides `policy.kind` for this step
    pub policy: Option<String>,
    /// Workers may read memory but not write it or propose
    pub read_only: bool,
}

impl Default for FileStepConfig {
    fn default() -> Self {
        Self {
            kind: String::new(),
            name: String::new(),
            workers: Vec::new(),
            rounds: 1,
            strategy: "majority".to_string(),
            weights: BTreeMap::new(),
            moderator: None,
            allow_self_vote: true,
            consensus_prefix: None,
            similarity: None,
            template: None,
            min_workers: 1,
            max_workers: 4,
            split: "auto".to_string(),
            specializer: "identical".to_string(),
            perspectives: Vec::new(),
            capabilities: BTreeMap::new(),
            capability_threshold: None,
            policy: None,
            read_only: false,
        }
    }
}

impl FileStepConfig {
    /// Dotted path used in issue messages, e.g. `steps.review.strategy`
    pub fn field(&self, key: &str) -> String {
        let name = if self.name.trim().is_empty() {
            "<unnamed>"
        } else {
            self.name.as_str()
        };
        format!("steps.{}.{}", name, key)
    }

    /// Unknown kinds are errors: there is no sensible step to fall back to.
    pub fn parse_kind(&self) -> (Option<StepKind>, Vec<ConfigIssue>) {
        match self.kind.parse::<StepKind>() {
            Ok(kind) => (Some(kind), vec![]),
            Err(_) => (
                None,
                vec![ConfigIssue::new(
                    Severity::Error,
                    self.field("kind"),
                    format!(
                        "unknown value '{}' (expected solo, parallel, debate or split)",
                        self.kind
                    ),
                )],
            ),
        }
    }

    pub fn parse_strategy(&self) -> (VotingStrategy, Vec<ConfigIssue>) {
        match self.strategy.parse::<VotingStrategy>() {
            Ok(strategy) => (strategy, vec![]),
            Err(_) => (
                VotingStrategy::Majority,
                vec![ConfigIssue::new(
                    Severity::Warning,
                    self.field("strategy"),
                    format!("unknown value '{}', falling back to 'majority'", self.strategy),
                )],
            ),
        }
    }

    /// Voting engine for a debate step, weights and consensus settings included
    pub fn voting_engine(&self) -> (VotingEngine, Vec<ConfigIssue>) {
        let (strategy, mut issues) = self.parse_strategy();

        let mut weights = Vec::new();
        for (id, weight) in &self.weights {
            match WorkerId::try_new(id.as_str()) {
                Some(id) if weight.is_finite() && *weight >= 0.0 => weights.push((id, *weight)),
                _ => issues.push(ConfigIssue::new(
                    Severity::Warning,
                    self.field("weights"),
                    format!("ignoring weight {} for '{}'", weight, id),
                )),
            }
        }
        if !weights.is_empty() && strategy != VotingStrategy::Weighted {
            issues.push(ConfigIssue::new(
                Severity::Warning,
                self.field("weights"),
                format!("weights have no effect with strategy '{}'", strategy),
            ));
        }

        let mut consensus = ConsensusSettings::default();
        if let Some(prefix) = self.consensus_prefix {
            consensus = consensus.with_prefix_len(prefix);
        }
        if let Some(similarity) = self.similarity {
            consensus = consensus.with_similarity_threshold(similarity);
        }

        let engine = VotingEngine::new(strategy)
            .with_weights(weights)
            .with_consensus(consensus);
        (engine, issues)
    }

    pub fn parse_splitter(&self) -> (Arc<dyn TaskSplitter>, Vec<ConfigIssue>) {
        match self.split.to_lowercase().as_str() {
            "auto" => (Arc::new(AutoSplitter), vec![]),
            "fixed" => (Arc::new(FixedSplitter), vec![]),
            _ => (
                Arc::new(AutoSplitter),
                vec![ConfigIssue::new(
                    Severity::Warning,
                    self.field("split"),
                    format!("unknown value '{}', falling back to 'auto'", self.split),
                )],
            ),
        }
    }

    pub fn parse_specializer(&self) -> (Arc<dyn TaskSpecializer>, Vec<ConfigIssue>) {
        match self.specializer.to_lowercase().as_str() {
            "identical" => (Arc::new(IdenticalTask), vec![]),
            "line_chunks" | "lines" => (Arc::new(LineChunks), vec![]),
            "perspectives" if self.perspectives.is_empty() => {
                (Arc::new(Perspectives::default()), vec![])
            }
            "perspectives" => (Arc::new(Perspectives::new(self.perspectives.clone())), vec![]),
            "capabilities" => {
                let (specializer, issues) = self.capabilities();
                (Arc::new(specializer), issues)
            }
            _ => (
                Arc::new(IdenticalTask),
                vec![ConfigIssue::new(
                    Severity::Warning,
                    self.field("specializer"),
                    format!(
                        "unknown value '{}', falling back to 'identical'",
                        self.specializer
                    ),
                )],
            ),
        }
    }

    fn capabilities(&self) -> (Capabilities, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let mut levels = Vec::new();
        for (id, level) in &self.capabilities {
            match WorkerId::try_new(id.as_str()) {
                Some(id) if level.is_finite() && *level >= 0.0 => levels.push((id, *level)),
                _ => issues.push(ConfigIssue::new(
                    Severity::Warning,
                    self.field("capabilities"),
                    format!("ignoring invalid capability {} for '{}'", level, id),
                )),
            }
        }
        let mut specializer = Capabilities::new(levels);
        if let Some(threshold) = self.capability_threshold {
            specializer = specializer.with_threshold(threshold);
        }
        (specializer, issues)
    }

    pub fn grant(&self) -> ViewGrant {
        if self.read_only {
            ViewGrant::read_only()
        } else {
            ViewGrant::default()
        }
    }
}
