//! Append-only checkpoint log, partitioned by thread, plus time-travel
//! fork/patch and diffing over it.
//!
//! Grounded in the teacher's `langgraph-checkpoint` crate: the same
//! `CheckpointSaver`-style trait shape and `InMemory*` reference
//! implementation, with the Pregel-specific multi-channel versioning dropped
//! in favor of a flat JSON payload blob.

pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod time_travel;
pub mod traits;

pub use checkpoint::{Checkpoint, CheckpointConfig, CheckpointDiff, CheckpointMetadata, TimelineEvent};
pub use error::{CheckpointError, Result};
pub use memory::InMemoryCheckpointStore;
pub use time_travel::Traveler;
pub use traits::CheckpointSaver;
