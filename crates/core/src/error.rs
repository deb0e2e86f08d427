//! Core Error Types
//!
//! Defines the foundational error types shared across the Task Cascade
//! workspace. These error types only depend on thiserror + std so the core
//! crate stays lightweight.
//!
//! The application crate wraps these in `AppError` and adds variants for
//! configuration, planning and execution failures.

use thiserror::Error;

/// Core error type for the Task Cascade workspace.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A parameter is missing or does not satisfy its spec
    #[error("Validation error: {0}")]
    Validation(String),

    /// An external collaborator (LLM, page executor, snapshot provider) failed
    #[error("Capability error: {0}")]
    Capability(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Parse errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a capability error
    pub fn capability(msg: impl Into<String>) -> Self {
        Self::Capability(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether a task failing with this error may be retried.
    ///
    /// Validation failures are deterministic; everything else may be transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CoreError::Validation(_))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}
