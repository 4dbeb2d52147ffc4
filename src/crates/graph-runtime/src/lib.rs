//! Message model and the collaborator traits shared across the retrieval-loop crates.
//!
//! This crate is the smallest common dependency of `context`, `checkpoint-store`,
//! and `autofix`: the `Message`/`MessageRole` types the context manager mutates,
//! the single-method `GraphRuntime` trait the auto-fix loop retries against, and
//! the `EventEmitter` seam those crates use to publish onto the kernel's event
//! bus without depending on the kernel crate. It carries none of the domain
//! logic of the link graph or the reactive kernel.

pub mod error;
pub mod events;
pub mod messages;
pub mod runtime;

pub use error::{GraphRuntimeError, Result};
pub use events::{EventEmitter, NullEventEmitter};
pub use messages::{Message, MessageRole, TrimOptions, TrimStrategy, trim_messages};
pub use runtime::GraphRuntime;
