//! Checkpoint and timeline types.
//!
//! A checkpoint is a flat, opaque JSON payload — this is not a multi-channel
//! Pregel snapshot, just a point-in-time capture of whatever state a thread
//! wants remembered (typically a context manager snapshot).

use serde::{Deserialize, Serialize};
use serde_json::Value;

const PREVIEW_MAX_CHARS: usize = 200;

/// Identifies a thread's checkpoint, or a request for "the latest on this thread".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckpointConfig {
    /// Partition key for the append-only log.
    pub thread_id: String,
    /// Specific checkpoint, or `None` for "latest".
    pub checkpoint_id: Option<String>,
}

impl CheckpointConfig {
    /// Build a config that resolves to the latest checkpoint on `thread_id`.
    pub fn latest(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            checkpoint_id: None,
        }
    }

    /// Build a config pinned to an exact checkpoint.
    pub fn exact(thread_id: impl Into<String>, checkpoint_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            checkpoint_id: Some(checkpoint_id.into()),
        }
    }
}

/// Metadata carried alongside a checkpoint's payload.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CheckpointMetadata {
    /// Why this checkpoint was written (e.g. `"turn_sealed"`, `"fork"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Arbitrary extra fields callers want recorded.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, Value>,
}

/// A single append-only log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Unique identifier.
    pub checkpoint_id: String,
    /// Thread this checkpoint belongs to.
    pub thread_id: String,
    /// The checkpoint this one was forked/derived from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_checkpoint_id: Option<String>,
    /// Distance from the latest checkpoint on the thread; 0 is latest, larger is older.
    pub step: u64,
    /// Wall-clock time the checkpoint was written, in Unix milliseconds.
    pub timestamp_unix_ms: i64,
    /// First [`PREVIEW_MAX_CHARS`] characters of the payload's debug rendering.
    pub preview: String,
    /// Structured metadata.
    pub metadata: CheckpointMetadata,
    /// Opaque caller-defined state.
    pub payload: Value,
}

impl Checkpoint {
    pub(crate) fn preview_of(payload: &Value) -> String {
        let rendered = payload.to_string();
        if rendered.chars().count() <= PREVIEW_MAX_CHARS {
            rendered
        } else {
            rendered.chars().take(PREVIEW_MAX_CHARS).collect()
        }
    }
}

/// Projection of a [`Checkpoint`] without its payload, for timeline listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Identifier of the checkpoint this event projects.
    pub checkpoint_id: String,
    /// Parent checkpoint, if any.
    pub parent_checkpoint_id: Option<String>,
    /// Distance from latest; 0 is newest.
    pub step: u64,
    /// Unix-ms timestamp.
    pub timestamp_unix_ms: i64,
    /// Truncated payload preview.
    pub preview: String,
    /// Why the checkpoint was written.
    pub reason: Option<String>,
}

impl From<&Checkpoint> for TimelineEvent {
    fn from(cp: &Checkpoint) -> Self {
        Self {
            checkpoint_id: cp.checkpoint_id.clone(),
            parent_checkpoint_id: cp.parent_checkpoint_id.clone(),
            step: cp.step,
            timestamp_unix_ms: cp.timestamp_unix_ms,
            preview: cp.preview.clone(),
            reason: cp.metadata.reason.clone(),
        }
    }
}

/// Result of comparing two checkpoints' decoded payloads as flat key sets.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CheckpointDiff {
    /// Keys present in `b` but not `a`.
    pub added: Vec<String>,
    /// Keys present in `a` but not `b`.
    pub removed: Vec<String>,
    /// Keys present in both with different values.
    pub changed: Vec<String>,
}
