//! The kernel's lifecycle state machine.
//!
//! Grounded in the teacher's `orca::shutdown::ShutdownCoordinator` (an atomic
//! flag guarding a single transition) generalized into the full
//! `UNINITIALIZED -> INITIALIZING -> READY -> RUNNING -> SHUTTING_DOWN ->
//! STOPPED` progression the specification names, with every transition
//! serialized by one `parking_lot::Mutex` rather than an atomic bool.

use parking_lot::Mutex;

use crate::error::KernelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelState {
    Uninitialized,
    Initializing,
    Ready,
    Running,
    ShuttingDown,
    Stopped,
}

impl KernelState {
    fn label(self) -> &'static str {
        match self {
            Self::Uninitialized => "UNINITIALIZED",
            Self::Initializing => "INITIALIZING",
            Self::Ready => "READY",
            Self::Running => "RUNNING",
            Self::ShuttingDown => "SHUTTING_DOWN",
            Self::Stopped => "STOPPED",
        }
    }

    /// Whether `self -> next` is one of the lifecycle's permitted edges.
    fn allows(self, next: KernelState) -> bool {
        use KernelState::*;
        matches!(
            (self, next),
            (Uninitialized, Initializing)
                | (Initializing, Initializing) // idempotent re-entry during boot
                | (Initializing, Ready)
                | (Ready, Running)
                | (Running, ShuttingDown)
                | (ShuttingDown, Stopped)
        )
    }
}

impl std::fmt::Display for KernelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A single-lock-serialized holder of [`KernelState`].
pub struct StateMachine {
    state: Mutex<KernelState>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self { state: Mutex::new(KernelState::Uninitialized) }
    }

    pub fn current(&self) -> KernelState {
        *self.state.lock()
    }

    /// Move to `next` iff the edge is permitted; `initialize` is idempotent
    /// from `UNINITIALIZED` or `INITIALIZING` per the specification, so
    /// `Initializing -> Initializing` is allowed as a same-state no-op.
    pub fn transition_to(&self, next: KernelState) -> Result<(), KernelError> {
        let mut guard = self.state.lock();
        if *guard == next || guard.allows(next) {
            *guard = next;
            Ok(())
        } else {
            Err(KernelError::InvalidTransition {
                from: guard.label().to_string(),
                to: next.label().to_string(),
            })
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boots_through_the_full_lifecycle() {
        let sm = StateMachine::new();
        assert_eq!(sm.current(), KernelState::Uninitialized);
        sm.transition_to(KernelState::Initializing).unwrap();
        sm.transition_to(KernelState::Ready).unwrap();
        sm.transition_to(KernelState::Running).unwrap();
        sm.transition_to(KernelState::ShuttingDown).unwrap();
        sm.transition_to(KernelState::Stopped).unwrap();
        assert_eq!(sm.current(), KernelState::Stopped);
    }

    #[test]
    fn initialize_is_idempotent_while_initializing() {
        let sm = StateMachine::new();
        sm.transition_to(KernelState::Initializing).unwrap();
        sm.transition_to(KernelState::Initializing).unwrap();
        assert_eq!(sm.current(), KernelState::Initializing);
    }

    #[test]
    fn skipping_a_state_is_rejected() {
        let sm = StateMachine::new();
        let err = sm.transition_to(KernelState::Running).unwrap_err();
        assert!(matches!(err, KernelError::InvalidTransition { .. }));
    }

    #[test]
    fn cannot_resurrect_a_stopped_kernel() {
        let sm = StateMachine::new();
        for s in [
            KernelState::Initializing,
            KernelState::Ready,
            KernelState::Running,
            KernelState::ShuttingDown,
            KernelState::Stopped,
        ] {
            sm.transition_to(s).unwrap();
        }
        assert!(sm.transition_to(KernelState::Running).is_err());
    }
}
