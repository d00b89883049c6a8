//! Port definitions (interfaces for external adapters)
//!
//! - [`worker`]: the capability steps dispatch tasks to
//! - [`summarizer`]: folds overflowing history into one entry
//! - [`fallback`]: replacement results for the fallback failure policy

pub mod fallback;
pub mod summarizer;
pub mod worker;
