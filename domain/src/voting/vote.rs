//! Ballots cast in the vote phase of a debate.

use crate::core::worker_id::WorkerId;
use serde::{Deserialize, Serialize};

/// What a ballot names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    Worker(WorkerId),
    Abstain,
}

/// One ballot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter: WorkerId,
    pub choice: Choice,
}

impl Vote {
    pub fn new(voter: impl Into<WorkerId>, choice: Choice) -> Self {
        Self {
            voter: voter.into(),
            choice,
        }
    }

    /// A ballot for `candidate`
    pub fn for_worker(voter: impl Into<WorkerId>, candidate: impl Into<WorkerId>) -> Self {
        Self::new(voter, Choice::Worker(candidate.into()))
    }

    pub fn abstain(voter: impl Into<WorkerId>) -> Self {
        Self::new(voter, Choice::Abstain)
    }

    pub fn is_abstention(&self) -> bool {
        matches!(self.choice, Choice::Abstain)
    }

    /// The named candidate, if any
    pub fn candidate(&self) -> Option<&WorkerId> {
        match &self.choice {
            Choice::Worker(id) => Some(id),
            Choice::Abstain => None,
        }
    }
}
