//! Error taxonomy for the kernel's gatekeeper, reactor, and lifecycle state machine.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatekeeperError {
    /// `tool_name` was not of the shape `<target_skill>.<command>`.
    #[error("invalid tool name: {0}")]
    InvalidToolName(String),

    /// The caller claimed an identity with no matching manifest.
    #[error("identity verification failed for caller {0:?}")]
    IdentityVerificationFailed(String),

    /// The caller's manifest does not grant `required`.
    #[error("permission denied: {required} not granted")]
    PermissionDenied { required: String },
}

#[derive(Debug, Error)]
pub enum KernelError {
    /// A lifecycle method was called from a state that does not permit it.
    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: String, to: String },

    /// Boot or shutdown failed at a named step.
    #[error("boot step '{step}' failed: {reason}")]
    BootFailed { step: String, reason: String },

    /// A skill name referenced by a hot-reload or lookup is not registered.
    #[error("unknown skill: {0}")]
    UnknownSkill(String),

    /// A collaborator (rule store, skill loader, watcher root) reported a resource failure.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// The kernel was asked to act while shutting down or stopped.
    #[error("operation cancelled: kernel is {0}")]
    Cancelled(String),

    #[error(transparent)]
    Gatekeeper(#[from] GatekeeperError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, KernelError>;
