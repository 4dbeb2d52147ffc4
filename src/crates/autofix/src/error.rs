//! Error taxonomy for the auto-fix loop.

use thiserror::Error;

/// The failure an attempt raised, as surfaced to callers and fed to [`crate::classify::classify`].
#[derive(Debug, Error, Clone)]
pub enum AttemptFailure {
    /// `validator(result)` returned `false`.
    #[error("validation failed: {0}")]
    Validation(String),

    /// `graph.ainvoke` itself raised.
    #[error("graph invocation failed: {0}")]
    Graph(String),
}

#[derive(Debug, Error)]
pub enum AutofixError {
    /// All retries exhausted (or the failure classified `Fatal`); carries the
    /// last attempt's failure, per the "re-raise the original error" contract.
    #[error("auto-fix exhausted after {attempts_used} attempt(s): {cause}")]
    Exhausted { attempts_used: usize, cause: AttemptFailure },

    /// The fork itself failed; per the algorithm this re-raises the
    /// *original* attempt failure, not the fork error, so this variant is
    /// only reachable when the original failure is unavailable (defensive).
    #[error(transparent)]
    Checkpoint(#[from] checkpoint_store::CheckpointError),
}

pub type Result<T> = std::result::Result<T, AutofixError>;
