//! Voting for debates.
//!
//! A debate ends with a set of final [`Proposal`]s and, depending on the
//! [`VotingStrategy`], either a list of [`Vote`]s or a moderator's answer.
//! [`VotingEngine`] turns them into an immutable [`Decision`].
//!
//! ```
//! use council_domain::voting::{Proposal, Vote, VotingEngine, VotingStrategy, Resolution};
//!
//! let proposals = vec![
//!     Proposal::new("a", 1, "use a b-tree"),
//!     Proposal::new("b", 1, "use a hash map"),
//! ];
//! let votes = vec![Vote::for_worker("a", "b"), Vote::for_worker("b", "b")];
//!
//! let decision = VotingEngine::new(VotingStrategy::Majority)
//!     .decide("storage", &proposals, &votes)
//!     .unwrap();
//! assert_eq!(decision.winner.as_str(), "b");
//! assert_eq!(decision.resolution, Resolution::Clear);
//! ```

pub mod decision;
pub mod engine;
pub mod parsing;
pub mod proposal;
pub mod strategy;
pub mod vote;

pub use decision::{Decision, Resolution, Tally};
pub use engine::VotingEngine;
pub use parsing::{ParsedVote, parse_moderator_choice, parse_vote};
pub use proposal::{Proposal, ProposalLedger};
pub use strategy::{ConsensusSettings, VotingStrategy};
pub use vote::{Choice, Vote};
