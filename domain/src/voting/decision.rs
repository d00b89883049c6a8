//! Recorded outcome of a vote.

use super::strategy::VotingStrategy;
use crate::core::worker_id::WorkerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ballot counts behind a decision
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tally {
    /// Votes per candidate (candidates without votes are absent)
    pub counts: BTreeMap<WorkerId, usize>,
    /// Weighted score per candidate
    pub scores: BTreeMap<WorkerId, f64>,
    pub abstentions: usize,
    /// Ballots naming no candidate
    pub invalid: usize,
    /// All ballots, counted or not
    pub total: usize,
}

impl Tally {
    pub fn count(&self, candidate: &WorkerId) -> usize {
        self.counts.get(candidate).copied().unwrap_or(0)
    }

    pub fn score(&self, candidate: &WorkerId) -> f64 {
        self.scores.get(candidate).copied().unwrap_or(0.0)
    }

    /// Ballots that were credited to a candidate
    pub fn counted(&self) -> usize {
        self.counts.values().sum()
    }
}

/// How the winner was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// A single candidate led the tally
    Clear,
    /// Several candidates shared the lead; earliest submission won
    TieBroken,
    /// No ballot was counted; first proposal won
    NoVotes,
    /// Proposals converged before voting
    Converged,
    /// Rounds ran out without convergence; majority decided
    ConsensusFallback,
    /// The moderator named a known candidate
    ModeratorChoice,
    /// The moderator's answer was unusable; first proposal won
    ModeratorFallback,
}

impl Resolution {
    /// True when the winner came from a fallback rather than a clear signal
    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolution::NoVotes | Resolution::ModeratorFallback)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Resolution::Clear => "clear",
            Resolution::TieBroken => "tie_broken",
            Resolution::NoVotes => "no_votes",
            Resolution::Converged => "converged",
            Resolution::ConsensusFallback => "consensus_fallback",
            Resolution::ModeratorChoice => "moderator_choice",
            Resolution::ModeratorFallback => "moderator_fallback",
        };
        write!(f, "{}", s)
    }
}

/// Immutable record of a debate's outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub step_name: String,
    pub method: VotingStrategy,
    pub winner: WorkerId,
    pub winning_text: String,
    pub rationale: String,
    pub tally: Tally,
    /// Other candidates, best first
    pub alternatives: Vec<WorkerId>,
    pub resolution: Resolution,
    pub decided_at: DateTime<Utc>,
}
