//! Error types for the access-control layer

use thiserror::Error;

/// Access-control errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Role name is not one of the known roles
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// Action name is not one of the known actions
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Invalid permission rule
    #[error("Invalid permission rule: {0}")]
    InvalidRule(String),

    /// Configuration could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for access-control operations
pub type Result<T> = std::result::Result<T, AuthzError>;
