//! Reference in-memory [`CheckpointSaver`] implementation.
//!
//! Checkpoints are stored per-thread in insertion order (oldest first). The
//! `step` field is never trusted from storage — it is recomputed from
//! position in the newest-first view on every read, so `step` is always
//! correct even across forks that leave gaps in the ancestry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata};
use crate::error::{CheckpointError, Result};
use crate::traits::CheckpointSaver;

/// What's actually stored; `step` is derived at read time, not carried here.
#[derive(Debug, Clone)]
struct StoredCheckpoint {
    checkpoint_id: String,
    parent_checkpoint_id: Option<String>,
    timestamp_unix_ms: i64,
    preview: String,
    metadata: CheckpointMetadata,
    payload: Value,
}

type Log = HashMap<String, Vec<StoredCheckpoint>>;

/// In-memory checkpoint store, suitable for tests and for single-process
/// deployments that don't need durability across restarts.
#[derive(Clone)]
pub struct InMemoryCheckpointStore {
    log: Arc<RwLock<Log>>,
}

impl InMemoryCheckpointStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self {
            log: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn materialize(thread_id: &str, stored: &StoredCheckpoint, step: u64) -> Checkpoint {
        Checkpoint {
            checkpoint_id: stored.checkpoint_id.clone(),
            thread_id: thread_id.to_string(),
            parent_checkpoint_id: stored.parent_checkpoint_id.clone(),
            step,
            timestamp_unix_ms: stored.timestamp_unix_ms,
            preview: stored.preview.clone(),
            metadata: stored.metadata.clone(),
            payload: stored.payload.clone(),
        }
    }
}

impl Default for InMemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckpointSaver for InMemoryCheckpointStore {
    async fn put(
        &self,
        config: &CheckpointConfig,
        payload: Value,
        metadata: CheckpointMetadata,
        parent_checkpoint_id: Option<String>,
    ) -> Result<CheckpointConfig> {
        let checkpoint_id = Uuid::new_v4().to_string();
        let stored = StoredCheckpoint {
            checkpoint_id: checkpoint_id.clone(),
            parent_checkpoint_id,
            timestamp_unix_ms: chrono::Utc::now().timestamp_millis(),
            preview: Checkpoint::preview_of(&payload),
            metadata,
            payload,
        };

        let mut log = self.log.write().await;
        log.entry(config.thread_id.clone()).or_default().push(stored);

        Ok(CheckpointConfig::exact(config.thread_id.clone(), checkpoint_id))
    }

    async fn get(&self, config: &CheckpointConfig) -> Result<Option<Checkpoint>> {
        let log = self.log.read().await;
        let Some(entries) = log.get(&config.thread_id) else {
            return Ok(None);
        };

        match &config.checkpoint_id {
            None => Ok(entries
                .last()
                .map(|stored| Self::materialize(&config.thread_id, stored, 0))),
            Some(wanted) => {
                let newest_first: Vec<&StoredCheckpoint> = entries.iter().rev().collect();
                Ok(newest_first
                    .iter()
                    .enumerate()
                    .find(|(_, stored)| &stored.checkpoint_id == wanted)
                    .map(|(step, stored)| Self::materialize(&config.thread_id, stored, step as u64)))
            }
        }
    }

    async fn list(&self, thread_id: &str, limit: Option<usize>) -> Result<Vec<Checkpoint>> {
        let log = self.log.read().await;
        let Some(entries) = log.get(thread_id) else {
            return Ok(Vec::new());
        };

        let newest_first = entries.iter().rev().enumerate().map(|(step, stored)| {
            Self::materialize(thread_id, stored, step as u64)
        });

        Ok(match limit {
            Some(limit) => newest_first.take(limit).collect(),
            None => newest_first.collect(),
        })
    }
}

/// Resolve the checkpoint `steps_back` behind the latest on `thread_id`, or
/// [`CheckpointError::HistoryTooShort`] if the thread doesn't have that much history.
pub(crate) async fn checkpoint_at_offset(
    saver: &dyn CheckpointSaver,
    thread_id: &str,
    steps_back: usize,
) -> Result<Checkpoint> {
    let history = saver.list(thread_id, Some(steps_back + 1)).await?;
    history
        .into_iter()
        .nth(steps_back)
        .ok_or(CheckpointError::HistoryTooShort {
            requested: steps_back,
            available: history_len(saver, thread_id).await?,
        })
}

async fn history_len(saver: &dyn CheckpointSaver, thread_id: &str) -> Result<usize> {
    Ok(saver.list(thread_id, None).await?.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointMetadata;

    #[tokio::test]
    async fn put_then_get_latest() {
        let store = InMemoryCheckpointStore::new();
        let config = CheckpointConfig::latest("thread-1");

        store
            .put(&config, serde_json::json!({"n": 1}), CheckpointMetadata::default(), None)
            .await
            .unwrap();
        let resolved = store
            .put(&config, serde_json::json!({"n": 2}), CheckpointMetadata::default(), None)
            .await
            .unwrap();

        let latest = store.get(&config).await.unwrap().unwrap();
        assert_eq!(latest.checkpoint_id, resolved.checkpoint_id.unwrap());
        assert_eq!(latest.step, 0);
        assert_eq!(latest.payload, serde_json::json!({"n": 2}));
    }

    #[tokio::test]
    async fn list_is_newest_first_with_recomputed_steps() {
        let store = InMemoryCheckpointStore::new();
        let config = CheckpointConfig::latest("thread-1");

        for n in 0..3 {
            store
                .put(&config, serde_json::json!({"n": n}), CheckpointMetadata::default(), None)
                .await
                .unwrap();
        }

        let history = store.list("thread-1", None).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].payload, serde_json::json!({"n": 2}));
        assert_eq!(history[0].step, 0);
        assert_eq!(history[2].payload, serde_json::json!({"n": 0}));
        assert_eq!(history[2].step, 2);
    }

    #[tokio::test]
    async fn checkpoint_at_offset_reports_history_too_short() {
        let store = InMemoryCheckpointStore::new();
        let config = CheckpointConfig::latest("thread-1");
        store
            .put(&config, serde_json::json!({}), CheckpointMetadata::default(), None)
            .await
            .unwrap();

        let err = checkpoint_at_offset(&store, "thread-1", 5).await.unwrap_err();
        match err {
            CheckpointError::HistoryTooShort { requested, available } => {
                assert_eq!(requested, 5);
                assert_eq!(available, 1);
            }
            other => panic!("expected HistoryTooShort, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_thread_returns_none_and_empty_list() {
        let store = InMemoryCheckpointStore::new();
        assert!(store
            .get(&CheckpointConfig::latest("ghost"))
            .await
            .unwrap()
            .is_none());
        assert!(store.list("ghost", None).await.unwrap().is_empty());
    }
}
