//! Shared state container and worker views.
//!
//! - [`Context`]: memory, bounded message history, step results and decisions
//! - [`WorkerView`]: what one worker may read and write during a step
//! - [`MessageHistory`]: the window primitives (FIFO drop and summary fold)

pub mod entities;
pub mod history;
pub mod view;

pub use entities::{Context, ContextSnapshot, Scope};
pub use history::{MIN_HISTORY, Message, MessageHistory, Role};
pub use view::{MemoryGrant, MemoryWrite, ViewGrant, WorkerView};
