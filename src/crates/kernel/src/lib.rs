//! Boot, component registry, reactor, gatekeeper, and lifecycle state machine
//! for the reactive kernel that hosts loaded skills and routes tool calls.

pub mod cortex;
pub mod error;
pub mod gatekeeper;
pub mod kernel;
pub mod reactor;
pub mod skill;
pub mod sniffer;
pub mod state;
pub mod watcher;

pub use cortex::{Cortex, CortexMatch};
pub use error::{GatekeeperError, KernelError, Result};
pub use gatekeeper::{validate_or_raise, OverloadHint, SkillManifest};
pub use kernel::{register_wildcard_observer, Kernel, KernelConfig};
pub use reactor::{Event, Handler, HandlerId, Reactor, ReactorStats, WILDCARD_TOPIC};
pub use skill::{LoadedSkill, NullSkillLoader, SkillCommand, SkillLoader, SkillRegistry};
pub use sniffer::{InMemoryRuleStore, RuleStore, Sniffer, SnifferRule};
pub use state::{KernelState, StateMachine};
pub use watcher::FileWatcher;
