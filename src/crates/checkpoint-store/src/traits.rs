//! The `CheckpointSaver` storage-backend abstraction.
//!
//! Implement this trait to back the checkpoint log with a store other than
//! the in-memory reference implementation — Redis, a file log, a database.
//! The in-process stats cache used by the link-graph backend is a separate
//! concern; this trait is only about the append-only checkpoint log.

use async_trait::async_trait;

use crate::checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata};
use crate::error::Result;
use serde_json::Value;

/// Storage backend for the append-only checkpoint log.
#[async_trait]
pub trait CheckpointSaver: Send + Sync {
    /// Append a new checkpoint for `config.thread_id` and return its resolved
    /// config (with `checkpoint_id` filled in).
    async fn put(
        &self,
        config: &CheckpointConfig,
        payload: Value,
        metadata: CheckpointMetadata,
        parent_checkpoint_id: Option<String>,
    ) -> Result<CheckpointConfig>;

    /// Fetch a single checkpoint: the exact one named by `config.checkpoint_id`,
    /// or the latest on `config.thread_id` when it is `None`.
    async fn get(&self, config: &CheckpointConfig) -> Result<Option<Checkpoint>>;

    /// List checkpoints for a thread, newest first, capped at `limit`.
    async fn list(&self, thread_id: &str, limit: Option<usize>) -> Result<Vec<Checkpoint>>;
}
