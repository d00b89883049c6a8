//! Scripted workers and fixtures shared by the unit tests.

use crate::config::RunSettings;
use crate::events::{EventBus, EventSubscription};
use crate::ports::summarizer::{Summarizer, SummarizerError};
use crate::ports::worker::{Worker, WorkerError, WorkerTemplate};
use crate::use_cases::error_handler::PolicyKind;
use crate::use_cases::steps::StepContext;
use crate::use_cases::steps::debate::VOTE_HEADER;
use async_trait::async_trait;
use council_domain::{Context, Event, Message, Scope, WorkerId, WorkerView};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

type Script = dyn Fn(&str, &WorkerView) -> Result<String, WorkerError> + Send + Sync;

/// Everything a step needs to run outside the orchestrator
pub struct Harness {
    pub context: Context,
    pub bus: EventBus,
    pub cancel: CancellationToken,
    pub settings: RunSettings,
    pub policy: PolicyKind,
}

impl Harness {
    pub fn new() -> Self {
        let settings = RunSettings::default();
        Self {
            context: Context::new(settings.max_history),
            bus: EventBus::new(),
            cancel: CancellationToken::new(),
            settings,
            policy: PolicyKind::Halt,
        }
    }

    pub fn ctx(&self) -> StepContext<'_> {
        StepContext {
            context: &self.context,
            bus: &self.bus,
            cancel: &self.cancel,
            policy: self.policy,
            settings: &self.settings,
        }
    }
}

/// A worker whose answers come from a closure
pub struct ScriptedWorker {
    id: WorkerId,
    script: Arc<Script>,
    delay: Option<Duration>,
    writes: Vec<(String, serde_json::Value, Scope)>,
    view_proposal: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedWorker {
    pub fn from_fn<F>(id: &str, script: F) -> Self
    where
        F: Fn(&str, &WorkerView) -> Result<String, WorkerError> + Send + Sync + 'static,
    {
        Self {
            id: WorkerId::new(id),
            script: Arc::new(script),
            delay: None,
            writes: Vec::new(),
            view_proposal: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn fixed(id: &str, text: &str) -> Self {
        let text = text.to_string();
        Self::from_fn(id, move |_, _| Ok(text.clone()))
    }

    pub fn failing(id: &str, message: &str) -> Self {
        let message = message.to_string();
        Self::from_fn(id, move |_, _| Err(WorkerError::Failed(message.clone())))
    }

    pub fn panicking(id: &str) -> Self {
        Self::from_fn(id, |_, _| panic!("scripted worker exploded"))
    }

    /// Fails the first `failures` calls, then answers `text`
    pub fn flaky(id: &str, failures: usize, text: &str) -> Self {
        let text = text.to_string();
        let seen = AtomicUsize::new(0);
        Self::from_fn(id, move |_, _| {
            if seen.fetch_add(1, Ordering::SeqCst) < failures {
                Err(WorkerError::Failed("transient".to_string()))
            } else {
                Ok(text.clone())
            }
        })
    }

    /// Answers "<id>: <task>"
    pub fn echo(id: &str) -> Self {
        let prefix = id.to_string();
        Self::from_fn(id, move |task, _| Ok(format!("{}: {}", prefix, task)))
    }

    /// Proposes `proposal` (and keeps it every round) and answers ballots with `vote`
    pub fn debater(id: &str, proposal: &str, vote: &str) -> Self {
        Self::debater_rounds(id, &[proposal], vote)
    }

    /// Proposes `texts[0]`, then `texts[r]` at round r (the last text repeats)
    pub fn debater_rounds(id: &str, texts: &[&str], vote: &str) -> Self {
        let texts: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let vote = vote.to_string();
        let turn = AtomicUsize::new(0);
        Self::from_fn(id, move |task, _| {
            if task.starts_with(VOTE_HEADER) {
                return Ok(vote.clone());
            }
            let n = turn.fetch_add(1, Ordering::SeqCst);
            Ok(texts[n.min(texts.len() - 1)].clone())
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_memory_write(mut self, key: &str, value: serde_json::Value, scope: Scope) -> Self {
        self.writes.push((key.to_string(), value, scope));
        self
    }

    pub fn with_view_proposal(mut self, text: &str) -> Self {
        self.view_proposal = Some(text.to_string());
        self
    }

    /// Shared call counter, readable after the worker has been moved
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Worker for ScriptedWorker {
    fn id(&self) -> &WorkerId {
        &self.id
    }

    async fn submit(&self, task: &str, view: &WorkerView) -> Result<String, WorkerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        for (key, value, scope) in &self.writes {
            view.set(key.clone(), value.clone(), *scope)
                .map_err(|e| WorkerError::Failed(e.to_string()))?;
        }
        if let Some(text) = &self.view_proposal {
            view.propose(text.clone())
                .map_err(|e| WorkerError::Failed(e.to_string()))?;
        }
        (self.script)(task, view)
    }
}

/// Instantiates echo workers
pub struct EchoTemplate {
    name: WorkerId,
}

impl EchoTemplate {
    pub fn new(name: &str) -> Self {
        Self {
            name: WorkerId::new(name),
        }
    }
}

impl WorkerTemplate for EchoTemplate {
    fn name(&self) -> &WorkerId {
        &self.name
    }

    fn instantiate(&self, id: WorkerId) -> Arc<dyn Worker> {
        Arc::new(ScriptedWorker::echo(id.as_str()))
    }
}

/// Summarizes by joining message contents
pub struct JoiningSummarizer;

#[async_trait]
impl Summarizer for JoiningSummarizer {
    async fn summarize(&self, messages: &[Message]) -> Result<String, SummarizerError> {
        Ok(messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join(" | "))
    }
}

pub struct FailingSummarizer;

#[async_trait]
impl Summarizer for FailingSummarizer {
    async fn summarize(&self, _messages: &[Message]) -> Result<String, SummarizerError> {
        Err(SummarizerError::Failed("model unavailable".to_string()))
    }
}

/// Everything published so far that the subscription has not seen
pub fn drain(subscription: &mut EventSubscription) -> Vec<Event> {
    let mut events = Vec::new();
    while let Some(event) = subscription.try_recv() {
        events.push(event);
    }
    events
}
