//! Use cases
//!
//! Application-level operations that orchestrate domain logic.
//!
//! - [`steps`]: the step variants and their concurrent fan-out
//! - [`error_handler`]: failure policies applied around a step
//! - [`context_window`]: history window with summarization
//! - [`moderators`]: round-robin moderators for debate steps
//! - [`run_workflow`]: the step orchestrator

pub mod context_window;
pub mod error_handler;
pub mod moderators;
pub mod run_workflow;
pub mod steps;
