//! Error types for linkgate

/// Errors surfaced by the authorization core.
///
/// `Forbidden` never carries the missing capability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkgateError {
    #[error("forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The storage collaborator failed
    #[error("storage error: {0}")]
    Storage(String),
}

impl LinkgateError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        LinkgateError::InvalidInput(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        LinkgateError::Conflict(msg.into())
    }
}

/// Result type alias for linkgate operations
pub type Result<T> = std::result::Result<T, LinkgateError>;

/// Convert any collaborator error to a storage error
pub fn err<E: std::error::Error>(e: E) -> LinkgateError {
    LinkgateError::Storage(e.to_string())
}
