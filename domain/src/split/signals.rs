//! Structural signals read from a task's text.

use serde::{Deserialize, Serialize};

/// Words handled by one worker when nothing else structures the task
pub const WORDS_PER_ITEM: usize = 50;

/// Which signal decided the split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    List,
    Paths,
    Lines,
    Words,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::List => write!(f, "list"),
            Signal::Paths => write!(f, "paths"),
            Signal::Lines => write!(f, "lines"),
            Signal::Words => write!(f, "words"),
        }
    }
}

/// Everything the splitters look at
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskSignals {
    /// Top-level list items, marker stripped, with their indented sub-lines
    pub list_items: Vec<String>,
    /// Whether the items come from a numbered list
    pub numbered: bool,
    /// Lines that belong to no list item
    pub preamble: Vec<String>,
    /// Distinct path-like tokens in order of appearance
    pub paths: Vec<String>,
    /// Non-empty lines
    pub lines: Vec<String>,
    pub words: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Numbered,
    Bullet,
}

impl TaskSignals {
    /// Read the task's structure.
    ///
    /// A numbered list takes precedence over bullets: when any numbered
    /// line exists, only numbered lines at the shallowest numbered indent
    /// become items. Deeper lines, and bullets that follow an item, are
    /// attached to the item above them.
    pub fn analyze(task: &str) -> Self {
        let mut signals = TaskSignals::default();

        let parsed: Vec<(usize, &str, Option<(Marker, &str)>)> = task
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let indent = line.len() - line.trim_start().len();
                let trimmed = line.trim();
                (indent, trimmed, strip_list_marker(trimmed))
            })
            .collect();

        signals.numbered = parsed
            .iter()
            .any(|(_, _, m)| matches!(m, Some((Marker::Numbered, _))));
        let item_kind = if signals.numbered {
            Marker::Numbered
        } else {
            Marker::Bullet
        };
        let top_indent = parsed
            .iter()
            .filter(|(_, _, m)| m.is_some_and(|(kind, _)| kind == item_kind))
            .map(|(indent, _, _)| *indent)
            .min();

        for (indent, trimmed, marker) in parsed {
            signals.lines.push(trimmed.to_string());
            match marker {
                Some((kind, item)) if kind == item_kind && Some(indent) == top_indent => {
                    signals.list_items.push(item.to_string());
                }
                _ => {
                    let nested = top_indent.is_some_and(|top| indent > top) || marker.is_some();
                    match signals.list_items.last_mut() {
                        Some(item) if nested => {
                            item.push('\n');
                            item.push_str(trimmed);
                        }
                        _ => signals.preamble.push(trimmed.to_string()),
                    }
                }
            }
        }

        for token in task.split_whitespace() {
            let token = token.trim_matches(|c: char| ",;:()[]{}\"'`".contains(c));
            let token = token.trim_end_matches(['.', '!', '?']);
            if is_path_like(token) && !signals.paths.iter().any(|p| p == token) {
                signals.paths.push(token.to_string());
            }
        }
        signals.words = task.split_whitespace().count();
        signals
    }

    /// Strongest signal present, with the count it suggests.
    ///
    /// A numbered list counts even with a single item.
    pub fn strongest(&self) -> (Signal, usize) {
        let list_min = if self.numbered { 1 } else { 2 };
        if self.list_items.len() >= list_min {
            (Signal::List, self.list_items.len())
        } else if !self.paths.is_empty() {
            (Signal::Paths, self.paths.len())
        } else if self.lines.len() > 1 {
            (Signal::Lines, self.lines.len())
        } else {
            (Signal::Words, self.words / WORDS_PER_ITEM)
        }
    }
}

/// Marker kind and item text after a `1.`, `1)`, `-` or `*` marker
fn strip_list_marker(line: &str) -> Option<(Marker, &str)> {
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        let rest = rest.trim();
        return (!rest.is_empty()).then_some((Marker::Bullet, rest));
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = &line[digits..];
    let rest = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')'))?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim();
    (!rest.is_empty()).then_some((Marker::Numbered, rest))
}

/// Contains a `/` (but is not a URL) or ends in a file extension
fn is_path_like(token: &str) -> bool {
    if token.len() < 3 || token.contains("://") {
        return false;
    }
    if token.contains('/') {
        return token.chars().any(|c| c.is_alphanumeric());
    }
    match token.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty()
                && (2..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && ext.chars().any(|c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_list_items() {
        let signals = TaskSignals::analyze("Do these:\n1. parse\n2) plan\n3. build\n");
        assert_eq!(signals.list_items, vec!["parse", "plan", "build"]);
        assert_eq!(signals.preamble, vec!["Do these:"]);
        assert_eq!(signals.strongest(), (Signal::List, 3));
    }

    #[test]
    fn test_bulleted_list_items() {
        let signals = TaskSignals::analyze("Do these:\n- build\n* test\n");
        assert_eq!(signals.list_items, vec!["build", "test"]);
        assert!(!signals.numbered);
        assert_eq!(signals.strongest(), (Signal::List, 2));
    }

    #[test]
    fn test_single_numbered_item_is_a_list() {
        let signals = TaskSignals::analyze("Do this:\n1. write the parser");
        assert_eq!(signals.list_items, vec!["write the parser"]);
        assert_eq!(signals.strongest(), (Signal::List, 1));

        // a lone bullet is not enough
        let signals = TaskSignals::analyze("Do this:\n- write the parser");
        assert_eq!(signals.strongest(), (Signal::Lines, 2));
    }

    #[test]
    fn test_sub_bullets_attach_to_numbered_item() {
        let signals = TaskSignals::analyze("1. parser\n   - handle utf8\n   - fuzz it\n2. planner\n- cache plans");
        assert_eq!(
            signals.list_items,
            vec!["parser\n- handle utf8\n- fuzz it", "planner\n- cache plans"]
        );
        assert!(signals.preamble.is_empty());
        assert_eq!(signals.strongest(), (Signal::List, 2));
    }

    #[test]
    fn test_indented_list_under_header() {
        let signals = TaskSignals::analyze("Steps:\n  1. lex\n     details\n  2. parse");
        assert_eq!(signals.list_items, vec!["lex\ndetails", "parse"]);
        assert_eq!(signals.preamble, vec!["Steps:"]);
    }

    #[test]
    fn test_numbers_without_marker_are_not_list_items() {
        let signals = TaskSignals::analyze("2024 was a year\n3.14 is pi");
        assert!(signals.list_items.is_empty());
    }

    #[test]
    fn test_path_tokens() {
        let signals = TaskSignals::analyze("Review src/main.rs, Cargo.toml and docs/ (see https://x.io/a), e.g. soon.");
        assert_eq!(signals.paths, vec!["src/main.rs", "Cargo.toml", "docs/"]);
        assert_eq!(signals.strongest(), (Signal::Paths, 3));
    }

    #[test]
    fn test_lines_then_words() {
        let signals = TaskSignals::analyze("first part\nsecond part\nthird part");
        assert_eq!(signals.strongest(), (Signal::Lines, 3));

        let long = "word ".repeat(120);
        assert_eq!(TaskSignals::analyze(&long).strongest(), (Signal::Words, 2));
        assert_eq!(TaskSignals::analyze("short task").strongest(), (Signal::Words, 0));
    }
}
