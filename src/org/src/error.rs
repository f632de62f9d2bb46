//! Error types for the organization engine

use thiserror::Error;

/// Organization engine errors
///
/// Authorization failures are not produced here: the engine is independent
/// of the authorization gate, which is consulted at the boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrgError {
    /// Missing or malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity absent
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Duplicate department name or record
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unit-of-work commit failure or timeout
    #[error("Transaction failed: {0}")]
    Transaction(String),
}

impl OrgError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        OrgError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        OrgError::Validation(message.into())
    }
}

/// Result type for organization operations
pub type Result<T> = std::result::Result<T, OrgError>;
