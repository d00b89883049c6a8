//! Debate step: propose, revise over rounds, then vote.
//!
//! ```text
//! Init → Propose → Round(1) → … → Round(n) → Vote → Decided
//!           │          │
//!           └──────────┴── consensus strategy: converged → Decided
//! ```
//!
//! Every phase is one concurrent fan-out that waits for all workers. A
//! worker that fails during Propose or a Round is dropped from later
//! phases, but its last proposal still stands in the vote. Under the halt
//! policy any such failure aborts the step instead.

use super::dispatch::{Assignment, Settled, fan_out};
use super::{StepContext, StepError, StepOutcome, validate_worker_ids};
use crate::ports::worker::Worker;
use crate::use_cases::error_handler::PolicyKind;
use council_domain::core::string::truncate;
use council_domain::{
    Decision, DomainError, EventDraft, EventKind, MemoryWrite, ParsedVote, Proposal,
    ProposalLedger, Resolution, StepOutput, StepResult, StepStatus, ViewGrant, Vote,
    VotingEngine, VotingStrategy, WorkerId, parse_vote,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub(crate) const ROUND_HEADER: &str = "## Debate round";
pub(crate) const VOTE_HEADER: &str = "## Vote";
pub(crate) const MODERATION_HEADER: &str = "## Moderation";

/// Default bytes of each proposal shown in a round digest
pub const DEFAULT_DIGEST_LIMIT: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Propose,
    Round(u32),
    Vote,
    Decided,
}

impl Phase {
    fn label(&self) -> String {
        match self {
            Phase::Propose => "propose".to_string(),
            Phase::Round(n) => format!("round_{}", n),
            Phase::Vote => "vote".to_string(),
            Phase::Decided => "decided".to_string(),
        }
    }
}

pub struct DebateStep {
    pub name: String,
    pub participants: Vec<Arc<dyn Worker>>,
    pub rounds: u32,
    pub engine: VotingEngine,
    pub moderator: Option<Arc<dyn Worker>>,
    pub allow_self_vote: bool,
    pub digest_limit: usize,
}

impl DebateStep {
    pub fn new(name: impl Into<String>, participants: Vec<Arc<dyn Worker>>) -> Self {
        Self {
            name: name.into(),
            participants,
            rounds: 1,
            engine: VotingEngine::default(),
            moderator: None,
            allow_self_vote: true,
            digest_limit: DEFAULT_DIGEST_LIMIT,
        }
    }

    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }

    pub fn with_engine(mut self, engine: VotingEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_moderator(mut self, moderator: Arc<dyn Worker>) -> Self {
        self.moderator = Some(moderator);
        self
    }

    pub fn with_self_vote(mut self, allow: bool) -> Self {
        self.allow_self_vote = allow;
        self
    }

    pub fn with_digest_limit(mut self, limit: usize) -> Self {
        self.digest_limit = limit;
        self
    }

    pub(super) fn validate(&self) -> Result<(), StepError> {
        validate_worker_ids(&self.name, self.participants.iter().map(|w| w.id()), 2)
    }

    pub(super) async fn execute(
        &self,
        task: &str,
        ctx: &StepContext<'_>,
    ) -> Result<StepOutcome, StepError> {
        let mut run = DebateRun {
            step: self,
            ctx,
            ledger: ProposalLedger::new(),
            active: vec![true; self.participants.len()],
            failed: Vec::new(),
            writes: Vec::new(),
        };

        // PROPOSE
        run.enter(Phase::Propose);
        let assignments = run.assign_active(|_| task.to_string());
        let settled = fan_out(&self.name, assignments, ctx).await?;
        run.collect(settled, 0)?;
        if run.ledger.is_empty() {
            return Err(StepError::NoProposals {
                step: self.name.clone(),
            });
        }

        let mut decision = run.converged(0);
        let mut rounds_completed = 0;

        // ROUND*
        for round in 1..=self.rounds {
            if decision.is_some() || run.active_count() == 0 {
                break;
            }
            run.enter(Phase::Round(round));
            let digest = self.digest(&run.ledger.final_proposals());
            let assignments = run.assign_active(|id| {
                let own = run
                    .ledger
                    .latest(id)
                    .map(|p| p.text.as_str())
                    .unwrap_or_default();
                self.round_prompt(task, own, &digest, round)
            });
            let settled = fan_out(&self.name, assignments, ctx).await?;
            run.collect(settled, round)?;
            rounds_completed = round;
            decision = run.converged(round);
        }

        // VOTE
        let finals = run.ledger.final_proposals();
        let decision = match decision {
            Some(decision) => decision,
            None => {
                run.enter(Phase::Vote);
                let decided = if self.engine.strategy().collects_ballots() {
                    let votes = run.ballots(task, &finals).await?;
                    self.engine.decide(&self.name, &finals, &votes)
                } else {
                    run.moderate(task, &finals).await?
                };
                decided.map_err(|e| match e {
                    DomainError::NoProposals => StepError::NoProposals {
                        step: self.name.clone(),
                    },
                    other => StepError::validation(&self.name, other.to_string()),
                })?
            }
        };
        run.enter(Phase::Decided);
        info!(
            step = %self.name,
            winner = %decision.winner,
            resolution = %decision.resolution,
            rounds_completed,
            "Debate decided"
        );

        let status = if run.failed.is_empty() {
            StepStatus::Success
        } else {
            StepStatus::Partial
        };
        let history: Vec<_> = run
            .ledger
            .history()
            .into_iter()
            .map(|p| json!({ "worker": p.worker_id, "round": p.round, "text": p.text }))
            .collect();

        let mut result = StepResult::new(
            &self.name,
            status,
            StepOutput::Text(decision.winning_text.clone()),
        )
        .with_metadata("strategy", json!(self.engine.strategy()))
        .with_metadata("rounds_completed", json!(rounds_completed))
        .with_metadata("converged", json!(decision.resolution == Resolution::Converged))
        .with_metadata("winner", json!(decision.winner))
        .with_metadata("resolution", json!(decision.resolution))
        .with_metadata("tally", json!(decision.tally))
        .with_metadata("abstentions", json!(decision.tally.abstentions))
        .with_metadata("history", json!(history))
        .with_metadata("failed_workers", json!(run.failed));
        for proposal in &finals {
            result
                .contributions
                .insert(proposal.worker_id.clone(), proposal.text.clone());
        }

        Ok(StepOutcome::new(result)
            .with_decision(decision)
            .with_writes(run.writes))
    }

    /// Bounded summary of every worker's current proposal
    fn digest(&self, proposals: &[Proposal]) -> String {
        proposals
            .iter()
            .map(|p| format!("[{}] {}", p.worker_id, truncate(p.text.trim(), self.digest_limit)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn round_prompt(&self, task: &str, own: &str, digest: &str, round: u32) -> String {
        format!(
            "{} {} of {}\n\nTask:\n{}\n\nYour current proposal:\n{}\n\nAll current proposals:\n{}\n\n\
             Revise your proposal in light of the others. Reply with your full revised proposal.",
            ROUND_HEADER, round, self.rounds, task, own, digest
        )
    }

    fn vote_prompt(&self, task: &str, finals: &[Proposal], voter: &WorkerId) -> String {
        let mut prompt = format!(
            "{}\n\nTask:\n{}\n\nFinal proposals:\n{}\n\n",
            VOTE_HEADER,
            task,
            render_candidates(finals)
        );
        if !self.allow_self_vote {
            prompt.push_str(&format!("You may not vote for your own proposal ({}).\n", voter));
        }
        prompt.push_str("Reply with a line 'VOTE: <worker id>' for the best proposal, or 'ABSTAIN'.");
        prompt
    }

    fn moderation_prompt(&self, task: &str, finals: &[Proposal]) -> String {
        format!(
            "{}\n\nTask:\n{}\n\nFinal proposals:\n{}\n\n\
             Pick the best proposal. Reply with a line 'WINNER: <worker id>'.",
            MODERATION_HEADER,
            task,
            render_candidates(finals)
        )
    }
}

fn render_candidates(finals: &[Proposal]) -> String {
    finals
        .iter()
        .map(|p| format!("### {}\n{}", p.worker_id, p.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Mutable state of one debate execution
struct DebateRun<'s, 'c, 'a> {
    step: &'s DebateStep,
    ctx: &'c StepContext<'a>,
    ledger: ProposalLedger,
    active: Vec<bool>,
    failed: Vec<WorkerId>,
    writes: Vec<MemoryWrite>,
}

impl DebateRun<'_, '_, '_> {
    fn enter(&self, phase: Phase) {
        debug!(step = %self.step.name, phase = %phase.label(), "Debate phase");
        self.ctx.bus.publish(
            EventDraft::new(EventKind::DebatePhase)
                .step(&self.step.name)
                .payload(json!({ "phase": phase.label(), "active": self.active_count() })),
        );
    }

    fn active_count(&self) -> usize {
        self.active.iter().filter(|a| **a).count()
    }

    fn active_workers(&self) -> Vec<&Arc<dyn Worker>> {
        self.step
            .participants
            .iter()
            .zip(&self.active)
            .filter(|(_, active)| **active)
            .map(|(w, _)| w)
            .collect()
    }

    fn assign_active(&self, prompt: impl Fn(&WorkerId) -> String) -> Vec<Assignment> {
        let workers = self.active_workers();
        let ids: Vec<WorkerId> = workers.iter().map(|w| w.id().clone()).collect();
        let views = self.ctx.context.fork_all(&ids, &ViewGrant::default());
        workers
            .into_iter()
            .zip(views)
            .map(|(worker, view)| {
                let task = prompt(worker.id());
                Assignment::new(Arc::clone(worker), task, view)
            })
            .collect()
    }

    /// Record a Propose/Round fan-out into the ledger
    fn collect(&mut self, settled: Vec<Settled>, round: u32) -> Result<(), StepError> {
        for s in settled {
            self.writes.extend(s.view.take_writes());
            match s.outcome {
                Ok(text) => {
                    let text = s.view.take_proposal().unwrap_or(text);
                    let proposal = self.ledger.submit(s.worker_id.clone(), round, text);
                    self.ctx.bus.publish(
                        EventDraft::new(EventKind::ProposalSubmitted)
                            .step(&self.step.name)
                            .worker(s.worker_id)
                            .payload(json!({
                                "round": round,
                                "sequence": proposal.sequence,
                                "bytes": proposal.text.len(),
                            })),
                    );
                }
                Err(source) => {
                    if self.ctx.policy == PolicyKind::Halt {
                        return Err(StepError::WorkerAborted {
                            step: self.step.name.clone(),
                            worker: s.worker_id,
                            source,
                        });
                    }
                    warn!(
                        step = %self.step.name,
                        worker = %s.worker_id,
                        round,
                        error = %source,
                        "Worker dropped from debate"
                    );
                    if let Some(i) = self.index_of(&s.worker_id) {
                        self.active[i] = false;
                    }
                    self.failed.push(s.worker_id);
                }
            }
        }
        Ok(())
    }

    fn index_of(&self, id: &WorkerId) -> Option<usize> {
        self.step.participants.iter().position(|w| w.id() == id)
    }

    /// Consensus check over the active workers' latest proposals
    fn converged(&self, round: u32) -> Option<Decision> {
        if self.step.engine.strategy() != VotingStrategy::Consensus {
            return None;
        }
        let active: Vec<Proposal> = self
            .active_workers()
            .into_iter()
            .filter_map(|w| self.ledger.latest(w.id()).cloned())
            .collect();
        if !self.step.engine.converged(active.iter().map(|p| p.text.as_str())) {
            return None;
        }
        let decision = self
            .step
            .engine
            .converged_decision(&self.step.name, &active, round)
            .ok()?;
        self.ctx.bus.publish(
            EventDraft::new(EventKind::DebateConverged)
                .step(&self.step.name)
                .worker(decision.winner.clone())
                .payload(json!({ "round": round, "workers": active.len() })),
        );
        Some(decision)
    }

    /// Ask every active worker for a ballot
    async fn ballots(&mut self, task: &str, finals: &[Proposal]) -> Result<Vec<Vote>, StepError> {
        let candidates: Vec<WorkerId> = finals.iter().map(|p| p.worker_id.clone()).collect();
        let assignments = self.assign_active(|voter| self.step.vote_prompt(task, finals, voter));
        let settled = fan_out(&self.step.name, assignments, self.ctx).await?;

        let mut votes = Vec::with_capacity(settled.len());
        for s in settled {
            self.writes.extend(s.view.take_writes());
            let parsed = match &s.outcome {
                Ok(text) => parse_vote(text, &candidates),
                Err(_) => ParsedVote::Abstain,
            };
            let vote = match parsed {
                ParsedVote::Candidate(choice)
                    if choice == s.worker_id && !self.step.allow_self_vote =>
                {
                    Vote::abstain(s.worker_id.clone())
                }
                ParsedVote::Candidate(choice) => Vote::for_worker(s.worker_id.clone(), choice),
                ParsedVote::Abstain | ParsedVote::Unparsed => Vote::abstain(s.worker_id.clone()),
            };
            self.ctx.bus.publish(
                EventDraft::new(EventKind::VoteCast)
                    .step(&self.step.name)
                    .worker(s.worker_id.clone())
                    .payload(json!({
                        "choice": vote.choice,
                        "invocation_failed": s.outcome.is_err(),
                    })),
            );
            votes.push(vote);
        }
        Ok(votes)
    }

    /// Ask the moderator (explicit, else first participant) to pick a winner
    async fn moderate(
        &mut self,
        task: &str,
        finals: &[Proposal],
    ) -> Result<Result<Decision, DomainError>, StepError> {
        let moderator = self
            .step
            .moderator
            .as_ref()
            .or_else(|| self.step.participants.first())
            .map(Arc::clone);
        let Some(moderator) = moderator else {
            return Ok(self.step.engine.moderate(&self.step.name, finals, None, None));
        };

        let view = self
            .ctx
            .context
            .fork_for_worker(moderator.id().clone(), ViewGrant::read_only());
        let prompt = self.step.moderation_prompt(task, finals);
        let assignment = Assignment::new(Arc::clone(&moderator), prompt, view);
        let settled = fan_out(&self.step.name, vec![assignment], self.ctx).await?;

        let response = settled.into_iter().next().and_then(|s| s.outcome.ok());
        if response.is_none() {
            warn!(step = %self.step.name, moderator = %moderator.id(), "Moderator gave no answer");
        }
        Ok(self.step.engine.moderate(
            &self.step.name,
            finals,
            Some(moderator.id()),
            response.as_deref(),
        ))
    }
}
