//! Error types for graph invocation.

use thiserror::Error;

/// Errors produced by a [`crate::GraphRuntime`] implementation.
#[derive(Debug, Error)]
pub enum GraphRuntimeError {
    /// The invocation itself failed (node error, validator rejection upstream, etc).
    #[error("graph invocation failed: {0}")]
    Invocation(String),

    /// The supplied config or input could not be interpreted.
    #[error("invalid invocation input: {0}")]
    InvalidInput(String),

    /// Serialization failure converting to/from the runtime's `Value` boundary.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Crate-root result alias.
pub type Result<T> = std::result::Result<T, GraphRuntimeError>;
