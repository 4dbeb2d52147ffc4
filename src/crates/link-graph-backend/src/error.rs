//! Error taxonomy for the link-graph backend.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    /// A caller-supplied configuration value was structurally invalid.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// The configured notebook root does not exist.
    #[error("notebook root missing: {0}")]
    NotebookRootMissing(String),

    /// The persistent stats cache could not be reached or returned malformed data.
    #[error("cache error: {0}")]
    Cache(String),

    #[error(transparent)]
    Engine(#[from] link_graph::LinkGraphError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BackendError>;
