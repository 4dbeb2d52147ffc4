//! Error types for checkpoint storage and time-travel.

use thiserror::Error;

/// Errors that can occur while reading or writing checkpoints.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// No checkpoint matched the given config.
    #[error("checkpoint not found: {0}")]
    NotFound(String),

    /// `steps_back` requested more history than the thread has recorded.
    #[error("history too short: requested {requested} steps back, thread has {available}")]
    HistoryTooShort {
        /// Steps the caller asked to go back.
        requested: usize,
        /// Checkpoints actually available on the thread.
        available: usize,
    },

    /// The payload failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The underlying storage backend returned an error.
    #[error("storage error: {0}")]
    Storage(String),

    /// A patch or checkpoint reference was structurally invalid.
    #[error("invalid checkpoint: {0}")]
    Invalid(String),

    /// The graph runtime failed while applying a fork patch.
    #[error("fork failed: {0}")]
    ForkFailed(#[from] graph_runtime::GraphRuntimeError),
}

/// Crate-root result alias.
pub type Result<T> = std::result::Result<T, CheckpointError>;
