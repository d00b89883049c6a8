//! Value types produced by running steps: results and events.

pub mod event;
pub mod step_result;

pub use event::{Event, EventDraft, EventKind};
pub use step_result::{
    FAILURE_MARKER, ItemOutput, StepOutput, StepResult, StepStatus, WorkerOutcome,
};
