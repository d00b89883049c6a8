//! Worker identifier value object

use serde::{Deserialize, Serialize};

/// Identifier of a worker taking part in a run (Value Object)
///
/// Worker ids are compared case-sensitively, but vote and moderator parsing
/// match them case-insensitively against free text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    /// Create a new worker id
    ///
    /// # Panics
    /// Panics if the id is empty or only whitespace
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        assert!(!id.trim().is_empty(), "Worker id cannot be empty");
        Self(id)
    }

    /// Try to create a new worker id, returning None if invalid
    pub fn try_new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    /// Id of the `index`-th (1-based) worker cloned from a template
    pub fn derived(&self, index: usize) -> Self {
        Self(format!("{}#{}", self.0, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        WorkerId::new(s)
    }
}

impl From<String> for WorkerId {
    fn from(s: String) -> Self {
        WorkerId::new(s)
    }
}

impl AsRef<str> for WorkerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_id_creation() {
        let id = WorkerId::new("alpha");
        assert_eq!(id.as_str(), "alpha");
        assert_eq!(id.to_string(), "alpha");
    }

    #[test]
    fn test_try_new_rejects_blank() {
        assert!(WorkerId::try_new("   ").is_none());
        assert!(WorkerId::try_new("").is_none());
        assert!(WorkerId::try_new("b").is_some());
    }

    #[test]
    #[should_panic(expected = "Worker id cannot be empty")]
    fn test_new_panics_on_empty() {
        let _ = WorkerId::new("");
    }

    #[test]
    fn test_derived_ids() {
        let template = WorkerId::new("splitter");
        assert_eq!(template.derived(1).as_str(), "splitter#1");
        assert_eq!(template.derived(12).as_str(), "splitter#12");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = WorkerId::new("gamma");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"gamma\"");
        let parsed: WorkerId = serde_json::from_str("\"gamma\"").unwrap();
        assert_eq!(parsed, id);
    }
}
