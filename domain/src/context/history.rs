//! Bounded message history.
//!
//! [`MessageHistory`] keeps the window invariant (`len() <= max_len()`)
//! after every mutation. It only knows two ways of making room: dropping the
//! oldest entries, or replacing them with one synthetic summary entry whose
//! text was produced elsewhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Smallest usable window: one summary entry plus the newest message.
pub const MIN_HISTORY: usize = 2;

/// Author of a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Worker,
    Step,
    /// Synthetic entry that replaced older entries
    Summary,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Worker => write!(f, "worker"),
            Role::Step => write!(f, "step"),
            Role::Summary => write!(f, "summary"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "worker" | "assistant" => Ok(Role::Worker),
            "step" => Ok(Role::Step),
            "summary" => Ok(Role::Summary),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// One entry of the message history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            at: Utc::now(),
        }
    }

    pub fn summary(content: impl Into<String>) -> Self {
        Self::new(Role::Summary, content)
    }

    pub fn is_summary(&self) -> bool {
        self.role == Role::Summary
    }

    /// Rendered as `role: content`, the form handed to summarizers.
    pub fn render(&self) -> String {
        format!("{}: {}", self.role, self.content)
    }
}

/// Ordered history bounded by `max_len`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageHistory {
    entries: Vec<Message>,
    max_len: usize,
}

impl MessageHistory {
    /// Create an empty history. `max_len` is raised to [`MIN_HISTORY`] if lower.
    pub fn new(max_len: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_len: max_len.max(MIN_HISTORY),
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter()
    }

    /// Total content size in bytes
    pub fn byte_size(&self) -> usize {
        self.entries.iter().map(|m| m.content.len()).sum()
    }

    /// How many entries would have to go if one more message were appended
    pub fn overflow_if_appended(&self) -> usize {
        (self.entries.len() + 1).saturating_sub(self.max_len)
    }

    /// The oldest `n` entries (fewer if the history is shorter)
    pub fn oldest(&self, n: usize) -> &[Message] {
        &self.entries[..n.min(self.entries.len())]
    }

    /// Append, dropping oldest entries first if the window is full.
    ///
    /// Returns how many entries were dropped.
    pub fn push_truncating(&mut self, message: Message) -> usize {
        let dropped = self.overflow_if_appended();
        self.entries.drain(..dropped);
        self.entries.push(message);
        dropped
    }

    /// Replace the oldest `n` entries with one summary entry.
    ///
    /// Returns how many entries were folded (0 if `n` is 0 or history is empty).
    pub fn fold_oldest(&mut self, n: usize, summary: impl Into<String>) -> usize {
        let n = n.min(self.entries.len());
        if n == 0 {
            return 0;
        }
        self.entries.splice(..n, std::iter::once(Message::summary(summary)));
        n
    }

    /// Drop oldest entries until the content size is at most `max_bytes`.
    ///
    /// The newest entry is always kept. Returns how many entries were dropped.
    pub fn truncate_to_bytes(&mut self, max_bytes: usize) -> usize {
        let mut size = self.byte_size();
        let mut dropped = 0;
        while size > max_bytes && self.entries.len() - dropped > 1 {
            size -= self.entries[dropped].content.len();
            dropped += 1;
        }
        self.entries.drain(..dropped);
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(max: usize, count: usize) -> MessageHistory {
        let mut history = MessageHistory::new(max);
        for i in 0..count {
            history.push_truncating(Message::new(Role::User, format!("m{}", i)));
        }
        history
    }

    #[test]
    fn test_max_len_is_clamped() {
        assert_eq!(MessageHistory::new(0).max_len(), MIN_HISTORY);
        assert_eq!(MessageHistory::new(1).max_len(), MIN_HISTORY);
        assert_eq!(MessageHistory::new(7).max_len(), 7);
    }

    #[test]
    fn test_push_truncating_keeps_window() {
        let history = filled(4, 9);
        assert_eq!(history.len(), 4);
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m5", "m6", "m7", "m8"]);
    }

    #[test]
    fn test_overflow_if_appended() {
        assert_eq!(filled(3, 2).overflow_if_appended(), 0);
        assert_eq!(filled(3, 3).overflow_if_appended(), 1);
    }

    #[test]
    fn test_fold_oldest_inserts_one_summary() {
        let mut history = filled(5, 5);
        assert_eq!(history.fold_oldest(3, "first three"), 3);
        assert_eq!(history.len(), 3);
        assert!(history.as_slice()[0].is_summary());
        assert_eq!(history.as_slice()[0].content, "first three");
        assert_eq!(history.as_slice()[1].content, "m3");
    }

    #[test]
    fn test_fold_oldest_on_empty_is_noop() {
        let mut history = MessageHistory::new(3);
        assert_eq!(history.fold_oldest(2, "x"), 0);
        assert!(history.is_empty());
    }

    #[test]
    fn test_truncate_to_bytes_keeps_newest() {
        let mut history = MessageHistory::new(10);
        history.push_truncating(Message::new(Role::User, "aaaa"));
        history.push_truncating(Message::new(Role::User, "bbbb"));
        history.push_truncating(Message::new(Role::User, "cccccccc"));

        assert_eq!(history.truncate_to_bytes(10), 2);
        assert_eq!(history.len(), 1);
        assert_eq!(history.as_slice()[0].content, "cccccccc");
    }

    #[test]
    fn test_role_round_trip_through_str() {
        for role in [Role::System, Role::User, Role::Worker, Role::Step, Role::Summary] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert_eq!("assistant".parse::<Role>().unwrap(), Role::Worker);
        assert!("robot".parse::<Role>().is_err());
    }
}
