//! Voting strategies and their settings.

use serde::{Deserialize, Serialize};

/// How a debate picks its winner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingStrategy {
    /// Most votes wins
    #[default]
    Majority,
    /// Highest sum of voter weights wins
    Weighted,
    /// Stop early when proposals converge, otherwise majority
    Consensus,
    /// A designated worker names the winner
    Moderator,
}

impl VotingStrategy {
    /// Whether the vote phase asks every active worker for a ballot
    pub fn collects_ballots(&self) -> bool {
        !matches!(self, VotingStrategy::Moderator)
    }
}

impl std::fmt::Display for VotingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VotingStrategy::Majority => write!(f, "majority"),
            VotingStrategy::Weighted => write!(f, "weighted"),
            VotingStrategy::Consensus => write!(f, "consensus"),
            VotingStrategy::Moderator => write!(f, "moderator"),
        }
    }
}

impl std::str::FromStr for VotingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "majority" => Ok(VotingStrategy::Majority),
            "weighted" => Ok(VotingStrategy::Weighted),
            "consensus" => Ok(VotingStrategy::Consensus),
            "moderator" | "moderated" => Ok(VotingStrategy::Moderator),
            _ => Err(format!(
                "Invalid voting strategy: {} (expected majority, weighted, consensus or moderator)",
                s
            )),
        }
    }
}

/// Convergence test used by the consensus strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusSettings {
    /// Characters of normalized text compared
    pub prefix_len: usize,
    /// 1.0 means exact prefix match; lower values use token-set similarity
    pub similarity_threshold: f64,
}

impl Default for ConsensusSettings {
    fn default() -> Self {
        Self {
            prefix_len: 64,
            similarity_threshold: 1.0,
        }
    }
}

impl ConsensusSettings {
    pub fn with_prefix_len(mut self, prefix_len: usize) -> Self {
        self.prefix_len = prefix_len.max(1);
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn requires_exact_match(&self) -> bool {
        self.similarity_threshold >= 1.0
    }
}
