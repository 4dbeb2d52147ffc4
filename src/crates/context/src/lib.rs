//! Bounded-cost context window management: token-aware pruning, archive-zone
//! compression, and the stateful [`ContextManager`] that ties both to an
//! external [`Summarizer`].

pub mod error;
pub mod manager;
pub mod pruner;
pub mod summarizer;

pub use error::{ContextError, Result};
pub use manager::{ActiveContextStrategy, ContextManager, ContextSnapshot, PrunerConfigSnapshot};
pub use pruner::{extractive_summary, ContextPruner, ErrorInfo, TRUNCATE_KEEP_FIRST_RATIO};
pub use summarizer::{extract_summary_body, ExtractiveFallbackSummarizer, Summarizer, TrajectoryEntry, SUMMARY_MAX_CHARS};
