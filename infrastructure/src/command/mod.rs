//! Shell command adapters
//!
//! Workers, summarizers and fallbacks that shell out: the input goes to
//! stdin and trimmed stdout is the answer.

mod process;
mod summarizer;
mod worker;

pub use process::{CommandError, run_with_input};
pub use summarizer::{CommandFallback, CommandSummarizer};
pub use worker::{CommandWorker, CommandWorkerTemplate};
