//! Error taxonomy for the link-graph engine.

use thiserror::Error;

/// Errors raised by [`crate::engine::LinkGraphEngine`] and its collaborators.
#[derive(Debug, Error)]
pub enum LinkGraphError {
    /// An operation was attempted before the engine finished initializing,
    /// or after a full rebuild failed and left no usable index.
    #[error("link graph engine is not available")]
    EngineUnavailable,

    /// A caller-supplied option was structurally invalid (unknown
    /// `match_strategy`, non-positive `max_distance`, zero `limit`, ...).
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// The notebook tree could not be scanned or a note file could not be read.
    #[error("scan failed: {0}")]
    Scan(String),

    /// A full or delta refresh failed to apply.
    #[error("refresh failed: {0}")]
    Refresh(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkGraphError>;
