//! Application-level configuration.
//!
//! - [`RunSettings`]: history window, summarization, timeouts, event bus sizing

pub mod run_settings;

pub use run_settings::RunSettings;
