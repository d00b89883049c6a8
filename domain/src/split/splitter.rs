//! Work-item splitting strategies.

use super::signals::{Signal, TaskSignals};
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Result of splitting a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitPlan {
    /// Signal that chose the count, `None` for fixed splits
    pub signal: Option<Signal>,
    pub items: Vec<String>,
}

impl SplitPlan {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Decides how many work items a task becomes and what each one says
pub trait TaskSplitter: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn split(&self, task: &str, min_workers: usize, max_workers: usize) -> SplitPlan;
}

/// Check worker bounds before splitting
pub fn validate_bounds(min_workers: usize, max_workers: usize) -> Result<(), DomainError> {
    if min_workers == 0 {
        return Err(DomainError::InvalidConfig(
            "min_workers must be at least 1".to_string(),
        ));
    }
    if max_workers < min_workers {
        return Err(DomainError::InvalidConfig(format!(
            "max_workers ({}) is below min_workers ({})",
            max_workers, min_workers
        )));
    }
    Ok(())
}

/// Always `min_workers` items
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedSplitter;

impl TaskSplitter for FixedSplitter {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn split(&self, task: &str, min_workers: usize, _max_workers: usize) -> SplitPlan {
        let count = min_workers.max(1);
        let signals = TaskSignals::analyze(task);
        let (signal, _) = signals.strongest();
        SplitPlan {
            signal: None,
            items: build_items(task, &signals, signal, count),
        }
    }
}

/// Count chosen from the task's structure, clamped to the worker bounds
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoSplitter;

impl TaskSplitter for AutoSplitter {
    fn name(&self) -> &'static str {
        "auto"
    }

    fn split(&self, task: &str, min_workers: usize, max_workers: usize) -> SplitPlan {
        let min = min_workers.max(1);
        let max = max_workers.max(min);
        let signals = TaskSignals::analyze(task);
        let (signal, suggested) = signals.strongest();
        let count = suggested.clamp(min, max);
        SplitPlan {
            signal: Some(signal),
            items: build_items(task, &signals, signal, count),
        }
    }
}

/// Turn the units of `signal` into `count` item texts.
///
/// With at least `count` units, each item gets a contiguous, balanced chunk
/// of them. Otherwise every item is the whole task labelled `Part i/n`.
fn build_items(task: &str, signals: &TaskSignals, signal: Signal, count: usize) -> Vec<String> {
    let (units, separator) = match signal {
        Signal::List => (&signals.list_items, "\n"),
        Signal::Paths => (&signals.paths, ", "),
        Signal::Lines => (&signals.lines, "\n"),
        Signal::Words => return labelled_parts(task, count),
    };
    if units.len() < count {
        return labelled_parts(task, count);
    }

    balanced_chunks(units, count)
        .into_iter()
        .map(|chunk| {
            let body = chunk.join(separator);
            match signal {
                Signal::List if !signals.preamble.is_empty() => {
                    format!("{}\n{}", signals.preamble.join("\n"), body)
                }
                Signal::Paths => format!("{}\n\nFocus on: {}", task.trim(), body),
                _ => body,
            }
        })
        .collect()
}

fn labelled_parts(task: &str, count: usize) -> Vec<String> {
    (1..=count)
        .map(|i| format!("Part {}/{}: {}", i, count, task.trim()))
        .collect()
}

/// Split `units` into `count` contiguous chunks whose sizes differ by at most one
pub fn balanced_chunks<T>(units: &[T], count: usize) -> Vec<&[T]> {
    if count == 0 {
        return Vec::new();
    }
    let base = units.len() / count;
    let extra = units.len() % count;
    let mut chunks = Vec::with_capacity(count);
    let mut start = 0;
    for i in 0..count {
        let size = base + usize::from(i < extra);
        chunks.push(&units[start..start + size]);
        start += size;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(k: usize) -> String {
        let mut task = String::from("Implement the following:\n");
        for i in 1..=k {
            task.push_str(&format!("{}. feature {}\n", i, i));
        }
        task
    }

    #[test]
    fn test_auto_counts_numbered_list_within_bounds() {
        let plan = AutoSplitter.split(&numbered(4), 2, 6);
        assert_eq!(plan.signal, Some(Signal::List));
        assert_eq!(plan.len(), 4);
        assert_eq!(plan.items[0], "Implement the following:\nfeature 1");
        assert_eq!(plan.items[3], "Implement the following:\nfeature 4");
    }

    #[test]
    fn test_auto_single_numbered_item_is_one_worker() {
        let plan = AutoSplitter.split("Do this:\n1. write the parser", 1, 5);
        assert_eq!(plan.signal, Some(Signal::List));
        assert_eq!(plan.items, vec!["Do this:\nwrite the parser"]);
    }

    #[test]
    fn test_auto_sub_bullets_stay_with_their_item() {
        let plan = AutoSplitter.split("1. parser\n   - handle utf8\n2. planner", 1, 5);
        assert_eq!(plan.items, vec!["parser\n- handle utf8", "planner"]);
    }

    #[test]
    fn test_auto_clamps_to_max() {
        let plan = AutoSplitter.split(&numbered(7), 2, 3);
        assert_eq!(plan.len(), 3);
        // 7 items over 3 workers: 3 + 2 + 2
        assert_eq!(
            plan.items[0],
            "Implement the following:\nfeature 1\nfeature 2\nfeature 3"
        );
        assert_eq!(plan.items[2], "Implement the following:\nfeature 6\nfeature 7");
    }

    #[test]
    fn test_auto_clamps_to_min() {
        let plan = AutoSplitter.split(&numbered(2), 4, 6);
        assert_eq!(plan.len(), 4);
        assert!(plan.items[0].starts_with("Part 1/4: Implement the following:"));
        assert!(plan.items[3].starts_with("Part 4/4: "));
    }

    #[test]
    fn test_auto_short_task_uses_min() {
        let plan = AutoSplitter.split("summarize this", 2, 5);
        assert_eq!(plan.signal, Some(Signal::Words));
        assert_eq!(plan.items, vec!["Part 1/2: summarize this", "Part 2/2: summarize this"]);
    }

    #[test]
    fn test_auto_paths_keep_task() {
        let plan = AutoSplitter.split("Review src/a.rs src/b.rs", 1, 4);
        assert_eq!(plan.signal, Some(Signal::Paths));
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.items[1], "Review src/a.rs src/b.rs\n\nFocus on: src/b.rs");
    }

    #[test]
    fn test_fixed_always_min_workers() {
        let plan = FixedSplitter.split(&numbered(5), 2, 10);
        assert_eq!(plan.signal, None);
        assert_eq!(plan.len(), 2);
        assert!(plan.items[0].ends_with("feature 3"));
    }

    #[test]
    fn test_balanced_chunks() {
        let units = [1, 2, 3, 4, 5];
        let chunks = balanced_chunks(&units, 2);
        assert_eq!(chunks, vec![&[1, 2, 3][..], &[4, 5][..]]);
        assert!(balanced_chunks(&units, 0).is_empty());
    }

    #[test]
    fn test_validate_bounds() {
        assert!(validate_bounds(1, 1).is_ok());
        assert!(validate_bounds(0, 3).is_err());
        assert!(validate_bounds(3, 2).is_err());
    }
}
