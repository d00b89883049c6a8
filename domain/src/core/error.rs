//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Worker {worker} may not write {area}")]
    PermissionDenied { worker: String, area: String },

    #[error("No proposals to decide between")]
    NoProposals,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DomainError {
    /// Check if this error is a view permission failure
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, DomainError::PermissionDenied { .. })
    }
}
