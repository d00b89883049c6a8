//! Logging infrastructure: the run's event transcript.
//!
//! Provides [`JsonlEventLog`], a JSONL file writer fed from an
//! [`EventSubscription`](council_application::EventSubscription).

mod jsonl_event_log;

pub use jsonl_event_log::JsonlEventLog;
