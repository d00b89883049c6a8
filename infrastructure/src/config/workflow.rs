//! Building a runnable workflow from a [`FileConfig`].
//!
//! Workers become [`CommandWorker`]s, split templates become
//! [`CommandWorkerTemplate`]s, and the fallback policy recovers through a
//! [`CommandFallback`]. Validation runs first; any error-level issue stops
//! the build, warnings are kept on the [`Workflow`] for the caller to show.

use super::file_config::{ConfigIssue, FileConfig, FileStepConfig, Severity};
use crate::command::{CommandFallback, CommandSummarizer, CommandWorker, CommandWorkerTemplate};
use council_application::{
    DebateStep, FailurePolicy, ModeratorPool, ParallelStep, PolicyKind, RunSettings,
    SharedEventBus, SoloStep, SplitStep, Step, StepKind, StepOrchestrator, Summarizer, Worker,
};
use council_domain::WorkerId;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration ({} error(s)): {}", .issues.len(), render_issues(.issues))]
    Invalid { issues: Vec<ConfigIssue> },
}

fn render_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConfigError {
    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            issues: vec![ConfigIssue::new(Severity::Error, field, message)],
        }
    }
}

/// Steps, policies and settings ready to hand to a [`StepOrchestrator`]
pub struct Workflow {
    pub steps: Vec<Step>,
    pub default_policy: FailurePolicy,
    pub step_policies: Vec<(String, FailurePolicy)>,
    pub settings: RunSettings,
    pub summarizer: Option<Arc<dyn Summarizer>>,
    /// Rotation for debates that name no moderator
    pub moderators: ModeratorPool,
    /// Warning-level issues found while building
    pub warnings: Vec<ConfigIssue>,
}

impl Workflow {
    pub fn from_config(config: &FileConfig) -> Result<Self, ConfigError> {
        let (errors, warnings): (Vec<_>, Vec<_>) =
            config.validate().into_iter().partition(ConfigIssue::is_error);
        if !errors.is_empty() {
            return Err(ConfigError::Invalid { issues: errors });
        }

        let builder = Builder::new(config);
        let steps = config
            .steps
            .iter()
            .map(|step| builder.step(step))
            .collect::<Result<Vec<_>, _>>()?;

        let default_policy = builder.policy(config.policy.parse_default_kind().0);
        let step_policies = config
            .steps
            .iter()
            .filter_map(|step| {
                let kind = step.policy.as_ref()?;
                let (kind, _) = config.policy.parse_kind(&step.field("policy"), kind);
                Some((step.name.clone(), builder.policy(kind)))
            })
            .collect();

        let summarizer = config
            .summarizer
            .command
            .as_ref()
            .filter(|command| !command.trim().is_empty())
            .map(|command| Arc::new(CommandSummarizer::new(command.clone())) as Arc<dyn Summarizer>);

        let moderators = ModeratorPool::new(
            config
                .run
                .moderators
                .iter()
                .filter_map(|id| builder.workers.get(id.as_str()).cloned())
                .collect(),
        );

        debug!(
            steps = steps.len(),
            workers = config.workers.len(),
            warnings = warnings.len(),
            "Workflow built"
        );

        Ok(Self {
            steps,
            default_policy,
            step_policies,
            settings: config.run.to_run_settings(),
            summarizer,
            moderators,
            warnings,
        })
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(Step::name).collect()
    }

    pub fn into_orchestrator(self, bus: SharedEventBus) -> StepOrchestrator {
        let mut orchestrator = StepOrchestrator::new(self.steps, bus)
            .with_settings(self.settings)
            .with_policy(self.default_policy)
            .with_moderator_pool(self.moderators);
        for (step, policy) in self.step_policies {
            orchestrator = orchestrator.with_step_policy(step, policy);
        }
        if let Some(summarizer) = self.summarizer {
            orchestrator = orchestrator.with_summarizer(summarizer);
        }
        orchestrator
    }
}

/// Holds one shared instance per configured worker
struct Builder<'a> {
    config: &'a FileConfig,
    workers: HashMap<&'a str, Arc<dyn Worker>>,
}

impl<'a> Builder<'a> {
    fn new(config: &'a FileConfig) -> Self {
        let workers = config
            .workers
            .iter()
            .filter_map(|w| {
                let id = WorkerId::try_new(w.id.as_str())?;
                let mut worker = CommandWorker::new(id, w.command.clone());
                if w.bare {
                    worker = worker.without_context();
                }
                Some((w.id.as_str(), Arc::new(worker) as Arc<dyn Worker>))
            })
            .collect();
        Self { config, workers }
    }

    fn worker(&self, step: &FileStepConfig, id: &str) -> Result<Arc<dyn Worker>, ConfigError> {
        self.workers
            .get(id)
            .cloned()
            .ok_or_else(|| ConfigError::invalid(step.field("workers"), format!("unknown worker '{}'", id)))
    }

    fn workers(&self, step: &FileStepConfig) -> Result<Vec<Arc<dyn Worker>>, ConfigError> {
        step.workers.iter().map(|id| self.worker(step, id)).collect()
    }

    fn step(&self, step: &FileStepConfig) -> Result<Step, ConfigError> {
        let kind = step
            .parse_kind()
            .0
            .ok_or_else(|| ConfigError::invalid(step.field("kind"), "unknown step kind"))?;

        let built = match kind {
            StepKind::Solo => {
                let id = step
                    .workers
                    .first()
                    .ok_or_else(|| ConfigError::invalid(step.field("workers"), "no worker"))?;
                Step::Solo(SoloStep::new(&step.name, self.worker(step, id)?).with_grant(step.grant()))
            }
            StepKind::Parallel => Step::Parallel(
                ParallelStep::new(&step.name, self.workers(step)?)
                    .with_specializer(step.parse_specializer().0)
                    .with_grant(step.grant()),
            ),
            StepKind::Debate => {
                let mut debate = DebateStep::new(&step.name, self.workers(step)?)
                    .with_rounds(step.rounds)
                    .with_engine(step.voting_engine().0)
                    .with_self_vote(step.allow_self_vote);
                if let Some(moderator) = &step.moderator {
                    debate = debate.with_moderator(self.worker(step, moderator)?);
                }
                Step::Debate(debate)
            }
            StepKind::Split => {
                let template = step
                    .template
                    .as_deref()
                    .and_then(|id| self.config.worker(id))
                    .ok_or_else(|| ConfigError::invalid(step.field("template"), "unknown template"))?;
                let name = WorkerId::try_new(template.id.as_str())
                    .ok_or_else(|| ConfigError::invalid(step.field("template"), "empty template id"))?;
                let mut split = SplitStep::new(
                    &step.name,
                    Arc::new(CommandWorkerTemplate::new(name, template.command.clone())),
                )
                .with_splitter(step.parse_splitter().0)
                .with_bounds(step.min_workers, step.max_workers);
                split.grant = step.grant();
                Step::Split(split)
            }
        };
        Ok(built)
    }

    fn policy(&self, kind: PolicyKind) -> FailurePolicy {
        match kind {
            PolicyKind::Halt => FailurePolicy::Halt,
            PolicyKind::Continue => FailurePolicy::Continue,
            PolicyKind::Retry => FailurePolicy::Retry(self.config.policy.to_retry_policy()),
            PolicyKind::Fallback => match &self.config.policy.fallback_command {
                Some(command) => FailurePolicy::Fallback(Arc::new(CommandFallback::new(command.clone()))),
                None => FailurePolicy::Halt,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_application::EventBus;
    use council_domain::{StepOutput, StepStatus};

    const WORKFLOW: &str = r#"
        [run]
        max_history = 12
        worker_timeout_secs = 0

        [policy]
        kind = "retry"
        attempts = 2
        base_delay_ms = 10
        fallback_command = "echo recovered"

        [[workers]]
        id = "writer"
        command = "cat"
        bare = true

        [[workers]]
        id = "shouter"
        command = "tr a-z A-Z"
        bare = true

        [[steps]]
        kind = "solo"
        name = "draft"
        workers = ["writer"]

        [[steps]]
        kind = "parallel"
        name = "opinions"
        workers = ["writer", "shouter"]
        policy = "continue"

        [[steps]]
        kind = "debate"
        name = "review"
        workers = ["writer", "shouter"]
        rounds = 2
        strategy = "consensus"

        [[steps]]
        kind = "split"
        name = "implement"
        template = "writer"
        max_workers = 3
        split = "fixed"
        policy = "fallback"
    "#;

    fn config() -> FileConfig {
        toml::from_str(WORKFLOW).unwrap()
    }

    #[test]
    fn test_builds_every_step_kind() {
        let workflow = Workflow::from_config(&config()).unwrap();
        assert_eq!(workflow.step_names(), vec!["draft", "opinions", "review", "implement"]);
        let kinds: Vec<StepKind> = workflow.steps.iter().map(Step::kind).collect();
        assert_eq!(
            kinds,
            vec![StepKind::Solo, StepKind::Parallel, StepKind::Debate, StepKind::Split]
        );
        assert!(workflow.warnings.is_empty());
        assert!(workflow.summarizer.is_none());
        assert_eq!(workflow.settings.max_history, 12);
        assert!(workflow.settings.worker_timeout.is_none());

        let Step::Debate(debate) = &workflow.steps[2] else {
            panic!("expected a debate step");
        };
        assert_eq!(debate.rounds, 2);
        assert_eq!(debate.participants.len(), 2);
    }

    #[test]
    fn test_moderator_pool_fills_debates_without_moderator() {
        let mut config = config();
        config.run.moderators = vec!["shouter".to_string()];

        let workflow = Workflow::from_config(&config).unwrap();
        assert!(!workflow.moderators.is_empty());
        let orchestrator = workflow.into_orchestrator(EventBus::new().shared());
        let Step::Debate(debate) = &orchestrator.steps()[2] else {
            panic!("expected a debate step");
        };
        let moderator = debate.moderator.as_ref().map(|m| m.id().as_str());
        assert_eq!(moderator, Some("shouter"));
    }

    #[test]
    fn test_policies() {
        let workflow = Workflow::from_config(&config()).unwrap();
        assert_eq!(workflow.default_policy.kind(), PolicyKind::Retry);
        let overrides: Vec<(&str, PolicyKind)> = workflow
            .step_policies
            .iter()
            .map(|(name, policy)| (name.as_str(), policy.kind()))
            .collect();
        assert_eq!(
            overrides,
            vec![("opinions", PolicyKind::Continue), ("implement", PolicyKind::Fallback)]
        );
    }

    #[test]
    fn test_errors_stop_the_build() {
        let mut config = config();
        config.steps[0].workers = vec!["ghost".to_string()];
        config.steps[3].template = None;

        let Err(ConfigError::Invalid { issues }) = Workflow::from_config(&config) else {
            panic!("expected an invalid configuration");
        };
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(ConfigIssue::is_error));
    }

    #[test]
    fn test_warnings_are_kept() {
        let mut config = config();
        config.steps[2].strategy = "ranked".to_string();
        config.summarizer.command = Some("head -c 100".to_string());

        let workflow = Workflow::from_config(&config).unwrap();
        assert_eq!(workflow.warnings.len(), 1);
        assert!(workflow.summarizer.is_some());
    }

    #[test]
    fn test_error_message_lists_issues() {
        let err = ConfigError::Invalid {
            issues: vec![ConfigIssue::new(Severity::Error, "steps.x.kind", "unknown value 'y'")],
        };
        assert_eq!(
            err.to_string(),
            "Invalid configuration (1 error(s)): error: steps.x.kind: unknown value 'y'"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_configured_workflow_runs() {
        let mut config = config();
        config.steps.truncate(2);

        let workflow = Workflow::from_config(&config).unwrap();
        let bus = EventBus::with_capacity(
            workflow.settings.event_capacity,
            workflow.settings.event_retain,
        )
        .shared();
        let orchestrator = workflow.into_orchestrator(bus);

        let report = orchestrator.run("hello council").await.unwrap();
        assert_eq!(report.results.len(), 2);
        assert_eq!(
            report.results[0].output,
            StepOutput::Text("hello council".to_string())
        );
        assert_eq!(report.results[1].status, StepStatus::Success);
        assert_eq!(
            report.results[1].output.render(),
            "[writer] hello council\n\n[shouter] HELLO COUNCIL"
        );
    }
}
