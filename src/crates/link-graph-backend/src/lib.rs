//! Notebook root resolution, include/exclude policy, cache wiring, and
//! phase instrumentation around a [`link_graph::LinkGraphEngine`].

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod phase;

pub use backend::LinkGraphBackend;
pub use cache::{CacheLookup, StatsCache, StatsCacheEnvelope, CACHE_SCHEMA};
pub use config::{BackendConfig, BackendConfigOverrides, BASELINE_EXCLUDE};
pub use error::{BackendError, Result};
pub use phase::PhaseRecorder;
