//! Error types for the estate ID core.

/// Core error type for configuration and domain value validation.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A session identifier was empty.
    #[error("invalid session id: must not be empty")]
    InvalidSessionId,
}

/// Convenience result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
