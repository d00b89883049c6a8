//! Pure decision function over proposals and ballots.
//!
//! [`VotingEngine`] never fails on ambiguity. Ties go to the earliest
//! submission, an empty effective vote set goes to the first proposal, and
//! an unusable moderator answer goes to the first proposal. Each of these is
//! visible in [`Decision::resolution`]. The only error is having nothing to
//! decide between.

use super::decision::{Decision, Resolution, Tally};
use super::parsing::parse_moderator_choice;
use super::proposal::Proposal;
use super::strategy::{ConsensusSettings, VotingStrategy};
use super::vote::{Choice, Vote};
use crate::core::error::DomainError;
use crate::core::string::normalized_prefix;
use crate::core::worker_id::WorkerId;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};

const SCORE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Default)]
pub struct VotingEngine {
    strategy: VotingStrategy,
    weights: BTreeMap<WorkerId, f64>,
    consensus: ConsensusSettings,
}

impl VotingEngine {
    pub fn new(strategy: VotingStrategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    /// Voter weights for the weighted strategy (missing voters weigh 1.0)
    pub fn with_weights(mut self, weights: impl IntoIterator<Item = (WorkerId, f64)>) -> Self {
        self.weights = weights.into_iter().collect();
        self
    }

    pub fn with_consensus(mut self, consensus: ConsensusSettings) -> Self {
        self.consensus = consensus;
        self
    }

    pub fn strategy(&self) -> VotingStrategy {
        self.strategy
    }

    pub fn consensus(&self) -> &ConsensusSettings {
        &self.consensus
    }

    pub fn weight(&self, voter: &WorkerId) -> f64 {
        self.weights.get(voter).copied().unwrap_or(1.0)
    }

    /// Count ballots against the final proposals.
    ///
    /// A ballot for a worker whose text equals an earlier-submitted
    /// worker's text is credited to the earlier worker.
    pub fn tally(&self, proposals: &[Proposal], votes: &[Vote]) -> Tally {
        let canonical = canonical_candidates(proposals);
        let mut tally = Tally::default();

        for vote in votes {
            tally.total += 1;
            let candidate = match &vote.choice {
                Choice::Abstain => {
                    tally.abstentions += 1;
                    continue;
                }
                Choice::Worker(id) => id,
            };
            let Some(index) = proposals.iter().position(|p| &p.worker_id == candidate) else {
                tally.invalid += 1;
                continue;
            };
            let credited = proposals[canonical[index]].worker_id.clone();
            let weight = match self.strategy {
                VotingStrategy::Weighted => self.weight(&vote.voter),
                _ => 1.0,
            };
            *tally.counts.entry(credited.clone()).or_insert(0) += 1;
            *tally.scores.entry(credited).or_insert(0.0) += weight;
        }

        tally
    }

    /// Decide a winner from ballots.
    ///
    /// `proposals` must be in submission order. With the moderator strategy
    /// there is no moderator answer here, so the moderator fallback applies;
    /// use [`VotingEngine::moderate`] instead.
    pub fn decide(
        &self,
        step_name: &str,
        proposals: &[Proposal],
        votes: &[Vote],
    ) -> Result<Decision, DomainError> {
        if proposals.is_empty() {
            return Err(DomainError::NoProposals);
        }
        if self.strategy == VotingStrategy::Moderator {
            return self.moderate(step_name, proposals, None, None);
        }

        let tally = self.tally(proposals, votes);
        let canonical = canonical_candidates(proposals);
        let candidates: Vec<&Proposal> = proposals
            .iter()
            .enumerate()
            .filter(|(i, _)| canonical[*i] == *i)
            .map(|(_, p)| p)
            .collect();

        if tally.counted() == 0 {
            let first = &proposals[0];
            let rationale = format!(
                "No votes counted ({} abstained, {} invalid); first proposal by {} wins",
                tally.abstentions, tally.invalid, first.worker_id
            );
            let alternatives = candidates
                .iter()
                .skip(1)
                .map(|p| p.worker_id.clone())
                .collect();
            return Ok(self.build(step_name, first, rationale, tally, alternatives, Resolution::NoVotes));
        }

        let best = candidates
            .iter()
            .map(|p| tally.score(&p.worker_id))
            .fold(f64::MIN, f64::max);
        let leaders: Vec<&Proposal> = candidates
            .iter()
            .copied()
            .filter(|p| (tally.score(&p.worker_id) - best).abs() < SCORE_EPSILON)
            .collect();
        let winner = leaders[0];

        let mut resolution = if leaders.len() > 1 {
            Resolution::TieBroken
        } else {
            Resolution::Clear
        };
        if self.strategy == VotingStrategy::Consensus {
            resolution = Resolution::ConsensusFallback;
        }

        let mut rationale = match self.strategy {
            VotingStrategy::Weighted => format!(
                "{} scored {:.2} from {} of {} counted votes",
                winner.worker_id,
                best,
                tally.count(&winner.worker_id),
                tally.counted()
            ),
            _ => format!(
                "{} received {} of {} counted votes",
                winner.worker_id,
                tally.count(&winner.worker_id),
                tally.counted()
            ),
        };
        if leaders.len() > 1 {
            let tied: Vec<String> = leaders[1..].iter().map(|p| p.worker_id.to_string()).collect();
            rationale.push_str(&format!(
                "; tied with {}, earliest submission wins",
                tied.join(", ")
            ));
        }
        if self.strategy == VotingStrategy::Consensus {
            rationale.push_str("; proposals did not converge, majority decided");
        }

        let mut others: Vec<&Proposal> = candidates
            .iter()
            .copied()
            .filter(|p| p.worker_id != winner.worker_id)
            .collect();
        // stable sort keeps submission order among equal scores
        others.sort_by(|a, b| {
            tally
                .score(&b.worker_id)
                .partial_cmp(&tally.score(&a.worker_id))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let alternatives = others.iter().map(|p| p.worker_id.clone()).collect();

        Ok(self.build(step_name, winner, rationale, tally, alternatives, resolution))
    }

    /// Decide from a moderator's free-text answer.
    ///
    /// `response` is `None` when the moderator could not be asked or failed.
    /// An answer naming no known candidate falls back to the first proposal.
    pub fn moderate(
        &self,
        step_name: &str,
        proposals: &[Proposal],
        moderator: Option<&WorkerId>,
        response: Option<&str>,
    ) -> Result<Decision, DomainError> {
        if proposals.is_empty() {
            return Err(DomainError::NoProposals);
        }
        let candidate_ids: Vec<WorkerId> = proposals.iter().map(|p| p.worker_id.clone()).collect();
        let moderator_name = moderator
            .map(|m| m.to_string())
            .unwrap_or_else(|| "moderator".to_string());

        let mut tally = Tally {
            total: 1,
            ..Default::default()
        };
        let choice = response.and_then(|text| parse_moderator_choice(text, &candidate_ids));

        let (winner, rationale, resolution) = match choice
            .and_then(|id| proposals.iter().find(|p| p.worker_id == id))
        {
            Some(proposal) => {
                tally.counts.insert(proposal.worker_id.clone(), 1);
                tally.scores.insert(proposal.worker_id.clone(), 1.0);
                (
                    proposal,
                    format!("{} chose {}", moderator_name, proposal.worker_id),
                    Resolution::ModeratorChoice,
                )
            }
            None => {
                let reason = if response.is_some() {
                    tally.invalid = 1;
                    "named no candidate"
                } else {
                    tally.abstentions = 1;
                    "gave no answer"
                };
                (
                    &proposals[0],
                    format!(
                        "{} {}; first proposal by {} wins",
                        moderator_name, reason, proposals[0].worker_id
                    ),
                    Resolution::ModeratorFallback,
                )
            }
        };

        let alternatives = proposals
            .iter()
            .filter(|p| p.worker_id != winner.worker_id)
            .map(|p| p.worker_id.clone())
            .collect();
        Ok(self.build(step_name, winner, rationale, tally, alternatives, resolution))
    }

    /// Whether the given texts agree on their normalized prefix.
    ///
    /// At least two texts are needed. With a similarity threshold below 1.0
    /// the token-set similarity of every pair of prefixes must reach it.
    pub fn converged<'a>(&self, texts: impl IntoIterator<Item = &'a str>) -> bool {
        let prefixes: Vec<String> = texts
            .into_iter()
            .map(|t| normalized_prefix(t, self.consensus.prefix_len))
            .collect();
        if prefixes.len() < 2 {
            return false;
        }
        if self.consensus.requires_exact_match() {
            return prefixes.iter().all(|p| p == &prefixes[0]);
        }
        let mut min_similarity = 1.0_f64;
        for (i, a) in prefixes.iter().enumerate() {
            for b in &prefixes[i + 1..] {
                min_similarity = min_similarity.min(jaccard(a, b));
            }
        }
        min_similarity >= self.consensus.similarity_threshold
    }

    /// Decision for proposals that converged; the first one wins unanimously.
    pub fn converged_decision(
        &self,
        step_name: &str,
        proposals: &[Proposal],
        round: u32,
    ) -> Result<Decision, DomainError> {
        let first = proposals.first().ok_or(DomainError::NoProposals)?;
        let rationale = format!(
            "{} active proposals converged at round {}; {} wins unanimously",
            proposals.len(),
            round,
            first.worker_id
        );
        let alternatives = proposals
            .iter()
            .skip(1)
            .map(|p| p.worker_id.clone())
            .collect();
        Ok(self.build(
            step_name,
            first,
            rationale,
            Tally::default(),
            alternatives,
            Resolution::Converged,
        ))
    }

    fn build(
        &self,
        step_name: &str,
        winner: &Proposal,
        rationale: String,
        tally: Tally,
        alternatives: Vec<WorkerId>,
        resolution: Resolution,
    ) -> Decision {
        Decision {
            step_name: step_name.to_string(),
            method: self.strategy,
            winner: winner.worker_id.clone(),
            winning_text: winner.text.clone(),
            rationale,
            tally,
            alternatives,
            resolution,
            decided_at: Utc::now(),
        }
    }
}

/// For each proposal, the index of the earliest proposal with the same text
fn canonical_candidates(proposals: &[Proposal]) -> Vec<usize> {
    proposals
        .iter()
        .enumerate()
        .map(|(i, p)| {
            proposals[..i]
                .iter()
                .position(|earlier| earlier.text.trim() == p.text.trim())
                .unwrap_or(i)
        })
        .collect()
}

/// Token-set similarity of two strings
fn jaccard(a: &str, b: &str) -> f64 {
    let left: BTreeSet<&str> = a.split_whitespace().collect();
    let right: BTreeSet<&str> = b.split_whitespace().collect();
    let union = left.union(&right).count();
    if union == 0 {
        return 1.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> WorkerId {
        WorkerId::new(s)
    }

    fn proposals(pairs: &[(&str, &str)]) -> Vec<Proposal> {
        pairs
            .iter()
            .enumerate()
            .map(|(i, (worker, text))| {
                let mut p = Proposal::new(*worker, 1, *text);
                p.sequence = i as u64;
                p
            })
            .collect()
    }

    fn abc() -> Vec<Proposal> {
        proposals(&[("A", "use a b-tree"), ("B", "use a hash map"), ("C", "use a trie")])
    }

    #[test]
    fn test_majority_clear_winner() {
        let engine = VotingEngine::new(VotingStrategy::Majority);
        let votes = vec![
            Vote::for_worker("A", "A"),
            Vote::for_worker("B", "A"),
            Vote::for_worker("C", "B"),
        ];
        let decision = engine.decide("design", &abc(), &votes).unwrap();

        assert_eq!(decision.winner, id("A"));
        assert_eq!(decision.winning_text, "use a b-tree");
        assert_eq!(decision.resolution, Resolution::Clear);
        let expected: BTreeMap<WorkerId, usize> = [(id("A"), 2), (id("B"), 1)].into_iter().collect();
        assert_eq!(decision.tally.counts, expected);
        assert_eq!(decision.tally.abstentions, 0);
        assert_eq!(decision.tally.total, 3);
        assert_eq!(decision.alternatives, vec![id("B"), id("C")]);
    }

    #[test]
    fn test_majority_tie_goes_to_earliest_submission() {
        let engine = VotingEngine::new(VotingStrategy::Majority);
        let props = proposals(&[("A", "first"), ("B", "second")]);
        let votes = vec![Vote::for_worker("A", "B"), Vote::for_worker("B", "A")];
        let decision = engine.decide("s", &props, &votes).unwrap();

        assert_eq!(decision.winner, id("A"));
        assert_eq!(decision.resolution, Resolution::TieBroken);
        assert!(decision.rationale.contains("tied with B"));
    }

    #[test]
    fn test_weighted_scores() {
        let engine = VotingEngine::new(VotingStrategy::Weighted)
            .with_weights([(id("v1"), 0.9), (id("v2"), 0.5), (id("v3"), 0.9)]);
        let props = proposals(&[("A", "alpha plan"), ("B", "beta plan")]);
        let votes = vec![
            Vote::for_worker("v1", "A"),
            Vote::for_worker("v2", "B"),
            Vote::for_worker("v3", "A"),
        ];
        let decision = engine.decide("s", &props, &votes).unwrap();

        assert_eq!(decision.winner, id("A"));
        assert!((decision.tally.score(&id("A")) - 1.8).abs() < 1e-9);
        assert!((decision.tally.score(&id("B")) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_heavy_voter_beats_headcount() {
        let engine = VotingEngine::new(VotingStrategy::Weighted).with_weights([(id("lead"), 3.0)]);
        let props = proposals(&[("A", "a"), ("B", "b")]);
        let votes = vec![
            Vote::for_worker("x", "A"),
            Vote::for_worker("y", "A"),
            Vote::for_worker("lead", "B"),
        ];
        let decision = engine.decide("s", &props, &votes).unwrap();
        assert_eq!(decision.winner, id("B"));
        assert_eq!(decision.tally.count(&id("A")), 2);
    }

    #[test]
    fn test_tally_is_permutation_invariant() {
        let engine = VotingEngine::new(VotingStrategy::Majority);
        let votes = vec![
            Vote::for_worker("1", "A"),
            Vote::for_worker("2", "C"),
            Vote::abstain("3"),
            Vote::for_worker("4", "A"),
            Vote::for_worker("5", "nobody"),
            Vote::for_worker("6", "C"),
        ];
        let base = engine.tally(&abc(), &votes);

        let mut rotated = votes.clone();
        for _ in 0..votes.len() {
            rotated.rotate_left(1);
            assert_eq!(engine.tally(&abc(), &rotated), base);
            let mut reversed = rotated.clone();
            reversed.reverse();
            assert_eq!(engine.tally(&abc(), &reversed), base);
        }
        assert_eq!(base.abstentions, 1);
        assert_eq!(base.invalid, 1);
        assert_eq!(base.total, 6);
    }

    #[test]
    fn test_abstentions_only_fall_back_to_first_proposal() {
        let engine = VotingEngine::new(VotingStrategy::Majority);
        let votes = vec![Vote::abstain("A"), Vote::abstain("B")];
        let decision = engine.decide("s", &abc(), &votes).unwrap();

        assert_eq!(decision.winner, id("A"));
        assert_eq!(decision.resolution, Resolution::NoVotes);
        assert_eq!(decision.tally.abstentions, 2);
        assert_eq!(decision.tally.total, 2);
    }

    #[test]
    fn test_duplicate_text_credits_earlier_worker() {
        let engine = VotingEngine::new(VotingStrategy::Majority);
        let props = proposals(&[("A", "same idea"), ("B", "other"), ("C", " same idea ")]);
        let votes = vec![
            Vote::for_worker("x", "C"),
            Vote::for_worker("y", "A"),
            Vote::for_worker("z", "B"),
        ];
        let decision = engine.decide("s", &props, &votes).unwrap();
        assert_eq!(decision.winner, id("A"));
        assert_eq!(decision.tally.count(&id("A")), 2);
        assert_eq!(decision.tally.count(&id("C")), 0);
    }

    #[test]
    fn test_no_proposals_is_an_error() {
        let engine = VotingEngine::default();
        assert_eq!(engine.decide("s", &[], &[]).unwrap_err(), DomainError::NoProposals);
        assert_eq!(
            engine.moderate("s", &[], None, Some("x")).unwrap_err(),
            DomainError::NoProposals
        );
    }

    #[test]
    fn test_consensus_fallback_is_marked() {
        let engine = VotingEngine::new(VotingStrategy::Consensus);
        let votes = vec![Vote::for_worker("A", "B")];
        let decision = engine.decide("s", &abc(), &votes).unwrap();
        assert_eq!(decision.winner, id("B"));
        assert_eq!(decision.resolution, Resolution::ConsensusFallback);
    }

    #[test]
    fn test_moderator_choice_and_fallback() {
        let engine = VotingEngine::new(VotingStrategy::Moderator);
        let moderator = id("M");

        let chosen = engine
            .moderate("s", &abc(), Some(&moderator), Some("WINNER: C"))
            .unwrap();
        assert_eq!(chosen.winner, id("C"));
        assert_eq!(chosen.resolution, Resolution::ModeratorChoice);

        let unusable = engine
            .moderate("s", &abc(), Some(&moderator), Some("they are all great"))
            .unwrap();
        assert_eq!(unusable.winner, id("A"));
        assert_eq!(unusable.resolution, Resolution::ModeratorFallback);
        assert_eq!(unusable.tally.invalid, 1);

        let silent = engine.moderate("s", &abc(), Some(&moderator), None).unwrap();
        assert_eq!(silent.winner, id("A"));
        assert_eq!(silent.tally.abstentions, 1);
    }

    #[test]
    fn test_converged_exact_prefix() {
        let engine = VotingEngine::new(VotingStrategy::Consensus)
            .with_consensus(ConsensusSettings::default().with_prefix_len(12));
        assert!(engine.converged(["Use a B-Tree index here", "use  a b-tree   index there"]));
        assert!(!engine.converged(["use a b-tree", "use a hash map"]));
        assert!(!engine.converged(["only one"]));
    }

    #[test]
    fn test_converged_similarity_threshold() {
        let engine = VotingEngine::new(VotingStrategy::Consensus)
            .with_consensus(ConsensusSettings::default().with_similarity_threshold(0.6));
        // {use, a, b-tree, index} vs {use, a, b-tree, now}: 3/5
        assert!(engine.converged(["use a b-tree index", "use a b-tree now"]));
        assert!(!engine.converged(["use a b-tree index", "prefer hashing everything"]));
    }

    #[test]
    fn test_converged_decision() {
        let engine = VotingEngine::new(VotingStrategy::Consensus);
        let props = proposals(&[("B", "same"), ("A", "same")]);
        let decision = engine.converged_decision("s", &props, 2).unwrap();
        assert_eq!(decision.winner, id("B"));
        assert_eq!(decision.resolution, Resolution::Converged);
        assert_eq!(decision.alternatives, vec![id("A")]);
    }
}
