//! Application layer for council
//!
//! This crate contains the step variants, the orchestrator, the event bus,
//! port definitions, and run settings. It depends only on the domain layer.

pub mod config;
pub mod events;
pub mod ports;
pub mod use_cases;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::RunSettings;
pub use events::{EventBus, EventSubscription, SharedEventBus};
pub use ports::{
    fallback::{FallbackError, FallbackHandler, FnFallback},
    summarizer::{Summarizer, SummarizerError},
    worker::{Worker, WorkerError, WorkerTemplate},
};
pub use use_cases::context_window::{ContextWindow, WindowOutcome};
pub use use_cases::error_handler::{
    ErrorHandler, Escalation, FailurePolicy, PolicyKind, RetryPolicy,
};
pub use use_cases::moderators::ModeratorPool;
pub use use_cases::run_workflow::{OrchestratorError, RunReport, StepOrchestrator};
pub use use_cases::steps::{
    Capabilities, DebateStep, IdenticalTask, LineChunks, ParallelStep, Perspectives, SoloStep,
    SplitStep, Step, StepContext, StepError, StepKind, StepOutcome, TaskSpecializer,
};
