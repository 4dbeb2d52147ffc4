//! Error taxonomy for the context pruner, manager, and summarizer seam.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextError {
    /// `update_last_assistant` was called with no open turn.
    #[error("no open turn to close")]
    NoOpenTurn,

    /// A caller-supplied option was structurally invalid.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// The external summarizer failed; callers should fall back to the
    /// extractive summary rather than propagate this.
    #[error("summarizer failed: {0}")]
    Summarizer(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ContextError>;
