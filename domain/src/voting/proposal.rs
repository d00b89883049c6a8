//! Proposals submitted during a debate.

use crate::core::worker_id::WorkerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A worker's candidate answer at a given round (round 0 is the opening proposal)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub worker_id: WorkerId,
    pub round: u32,
    pub text: String,
    pub submitted_at: DateTime<Utc>,
    /// Acceptance order across the whole ledger
    pub sequence: u64,
}

impl Proposal {
    /// Build a proposal outside a ledger (sequence 0)
    pub fn new(worker_id: impl Into<WorkerId>, round: u32, text: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            round,
            text: text.into(),
            submitted_at: Utc::now(),
            sequence: 0,
        }
    }
}

/// Append-only store of every proposal made in one debate
///
/// Proposals are ordered by round, then by acceptance order within the round.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProposalLedger {
    proposals: Vec<Proposal>,
    next_sequence: u64,
}

impl ProposalLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a proposal, assigning the next sequence number
    pub fn submit(
        &mut self,
        worker_id: WorkerId,
        round: u32,
        text: impl Into<String>,
    ) -> &Proposal {
        let mut proposal = Proposal::new(worker_id, round, text);
        proposal.sequence = self.next_sequence;
        self.next_sequence += 1;
        self.proposals.push(proposal);
        &self.proposals[self.proposals.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    /// The most recent proposal of a worker
    pub fn latest(&self, worker_id: &WorkerId) -> Option<&Proposal> {
        self.proposals
            .iter()
            .rev()
            .find(|p| &p.worker_id == worker_id)
    }

    /// Proposals of one round in acceptance order
    pub fn round(&self, round: u32) -> Vec<&Proposal> {
        self.proposals.iter().filter(|p| p.round == round).collect()
    }

    /// Highest round with at least one proposal
    pub fn last_round(&self) -> Option<u32> {
        self.proposals.iter().map(|p| p.round).max()
    }

    /// Workers in the order of their first accepted proposal
    pub fn participants(&self) -> Vec<&WorkerId> {
        let mut seen: Vec<&WorkerId> = Vec::new();
        for proposal in &self.proposals {
            if !seen.contains(&&proposal.worker_id) {
                seen.push(&proposal.worker_id);
            }
        }
        seen
    }

    /// Latest proposal of every worker, in first-submission order
    pub fn final_proposals(&self) -> Vec<Proposal> {
        self.participants()
            .into_iter()
            .filter_map(|worker| self.latest(worker).cloned())
            .collect()
    }

    /// Every proposal ordered by (round, sequence)
    pub fn history(&self) -> Vec<&Proposal> {
        let mut all: Vec<&Proposal> = self.proposals.iter().collect();
        all.sort_by_key(|p| (p.round, p.sequence));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> WorkerId {
        WorkerId::new(s)
    }

    #[test]
    fn test_sequence_is_assigned_in_acceptance_order() {
        let mut ledger = ProposalLedger::new();
        assert_eq!(ledger.submit(id("b"), 0, "B0").sequence, 0);
        assert_eq!(ledger.submit(id("a"), 0, "A0").sequence, 1);
        assert_eq!(ledger.submit(id("b"), 1, "B1").sequence, 2);
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn test_final_proposals_follow_first_submission() {
        let mut ledger = ProposalLedger::new();
        ledger.submit(id("b"), 0, "B0");
        ledger.submit(id("a"), 0, "A0");
        ledger.submit(id("a"), 1, "A1");
        ledger.submit(id("b"), 1, "B1");

        let finals = ledger.final_proposals();
        let texts: Vec<_> = finals.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["B1", "A1"]);
    }

    #[test]
    fn test_latest_keeps_last_known_proposal() {
        let mut ledger = ProposalLedger::new();
        ledger.submit(id("a"), 0, "A0");
        ledger.submit(id("b"), 0, "B0");
        ledger.submit(id("b"), 1, "B1");

        // "a" dropped out after round 0
        assert_eq!(ledger.latest(&id("a")).unwrap().text, "A0");
        assert_eq!(ledger.latest(&id("b")).unwrap().round, 1);
        assert_eq!(ledger.last_round(), Some(1));
    }

    #[test]
    fn test_history_orders_by_round_then_sequence() {
        let mut ledger = ProposalLedger::new();
        ledger.submit(id("a"), 1, "late");
        ledger.submit(id("b"), 0, "early");
        let history = ledger.history();
        assert_eq!(history[0].text, "early");
        assert_eq!(history[1].text, "late");
        assert_eq!(ledger.round(0).len(), 1);
    }
}
