//! Domain layer for council
//!
//! This crate contains the core types and pure algorithms of a council run.
//! It has no dependencies on async runtimes, workers or I/O.
//!
//! # Core Concepts
//!
//! ## Context
//!
//! One [`Context`] per run holds shared memory, a bounded message history,
//! committed [`StepResult`]s and [`Decision`]s. Workers never touch it
//! directly; each gets a [`WorkerView`] with a snapshot and a write grant.
//!
//! ## Voting
//!
//! [`VotingEngine`] picks a debate winner by majority, weighted score,
//! consensus (early convergence) or a moderator's answer. Ambiguity always
//! resolves through a defined fallback recorded in [`Resolution`].
//!
//! ## Splitting
//!
//! [`TaskSplitter`]s turn a task into work items: [`FixedSplitter`] for a
//! fixed count, [`AutoSplitter`] for a count read from the task's structure.

pub mod context;
pub mod core;
pub mod orchestration;
pub mod split;
pub mod voting;

// Re-export commonly used types
pub use context::{
    Context, ContextSnapshot, MemoryGrant, MemoryWrite, Message, MessageHistory, Role, Scope,
    ViewGrant, WorkerView,
};
pub use core::{error::DomainError, worker_id::WorkerId};
pub use orchestration::{
    Event, EventDraft, EventKind, FAILURE_MARKER, ItemOutput, StepOutput, StepResult, StepStatus,
    WorkerOutcome,
};
pub use split::{AutoSplitter, FixedSplitter, Signal, SplitPlan, TaskSplitter};
pub use voting::{
    Choice, ConsensusSettings, Decision, ParsedVote, Proposal, ProposalLedger, Resolution, Tally,
    Vote, VotingEngine, VotingStrategy, parse_moderator_choice, parse_vote,
};
