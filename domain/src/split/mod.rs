//! Splitting one task into work items for a split step.

pub mod signals;
pub mod splitter;

pub use signals::{Signal, TaskSignals};
pub use splitter::{AutoSplitter, FixedSplitter, SplitPlan, TaskSplitter, balanced_chunks, validate_bounds};
