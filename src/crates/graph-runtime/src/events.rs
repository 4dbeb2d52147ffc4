//! The narrow event-emission seam shared by the checkpoint/time-travel and
//! auto-fix crates, so they can publish onto the kernel's event bus without
//! depending on the kernel crate itself.

use serde_json::Value;

/// Anything that can publish a namespaced event. The reactive kernel's event
/// bus is the production implementation; tests typically use a `Vec`-backed
/// recorder.
pub trait EventEmitter: Send + Sync {
    /// Publish `payload` under `topic` (e.g. `"time_travel/initiating"`).
    fn emit(&self, topic: &str, payload: Value);
}

/// An [`EventEmitter`] that discards everything. Useful as a default when the
/// caller doesn't care about observability of a single operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventEmitter;

impl EventEmitter for NullEventEmitter {
    fn emit(&self, _topic: &str, _payload: Value) {}
}
