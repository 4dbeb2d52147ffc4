//! Timeline retrieval, fork+patch, and checkpoint diffing.

use std::collections::BTreeSet;
use std::sync::Arc;

use graph_runtime::{EventEmitter, GraphRuntime, NullEventEmitter};
use serde_json::Value;

use crate::checkpoint::{CheckpointConfig, CheckpointDiff, CheckpointMetadata, TimelineEvent};
use crate::error::Result;
use crate::memory::checkpoint_at_offset;
use crate::traits::CheckpointSaver;

/// Time-travel operations over a [`CheckpointSaver`].
pub struct Traveler {
    saver: Arc<dyn CheckpointSaver>,
    events: Arc<dyn EventEmitter>,
}

impl Traveler {
    /// Build a traveler over `saver`, discarding emitted events.
    pub fn new(saver: Arc<dyn CheckpointSaver>) -> Self {
        Self {
            saver,
            events: Arc::new(NullEventEmitter),
        }
    }

    /// Build a traveler that publishes `time_travel/*` events through `events`.
    pub fn with_events(saver: Arc<dyn CheckpointSaver>, events: Arc<dyn EventEmitter>) -> Self {
        Self { saver, events }
    }

    /// Newest-first projection of a thread's checkpoints, without payloads.
    pub async fn get_timeline(&self, thread_id: &str, limit: Option<usize>) -> Result<Vec<TimelineEvent>> {
        let checkpoints = self.saver.list(thread_id, limit).await?;
        Ok(checkpoints.iter().map(TimelineEvent::from).collect())
    }

    /// Decoded payload of a specific checkpoint, or `None` if it doesn't exist
    /// on any thread this store knows about. Callers that know the thread
    /// should prefer looking it up via [`CheckpointSaver::get`] directly.
    pub async fn get_checkpoint_content(&self, thread_id: &str, checkpoint_id: &str) -> Result<Option<Value>> {
        let config = CheckpointConfig::exact(thread_id, checkpoint_id);
        Ok(self.saver.get(&config).await?.map(|cp| cp.payload))
    }

    /// Fork the thread `steps_back` behind its latest checkpoint, ask `graph`
    /// to apply `patch` against that state, and record the result as a new
    /// checkpoint whose parent is the forked-from one.
    pub async fn fork_and_correct(
        &self,
        graph: &dyn GraphRuntime,
        thread_id: &str,
        steps_back: usize,
        patch: Value,
        reason: impl Into<String>,
    ) -> Result<CheckpointConfig> {
        let source = checkpoint_at_offset(self.saver.as_ref(), thread_id, steps_back).await?;
        let reason = reason.into();

        self.events.emit(
            "time_travel/initiating",
            serde_json::json!({
                "thread_id": thread_id,
                "from_checkpoint_id": source.checkpoint_id,
                "steps_back": steps_back,
                "reason": reason,
            }),
        );

        let invoke_input = serde_json::json!({
            "base": source.payload,
            "patch": patch,
        });
        let new_payload = graph
            .ainvoke(invoke_input, serde_json::json!({ "thread_id": thread_id }))
            .await?;

        let metadata = CheckpointMetadata {
            reason: Some(reason.clone()),
            extra: serde_json::Map::new(),
        };
        let config = CheckpointConfig::latest(thread_id);
        let new_config = self
            .saver
            .put(&config, new_payload, metadata, Some(source.checkpoint_id.clone()))
            .await?;

        self.events.emit(
            "time_travel/complete",
            serde_json::json!({
                "thread_id": thread_id,
                "from_checkpoint_id": source.checkpoint_id,
                "to_checkpoint_id": new_config.checkpoint_id,
                "reason": reason,
            }),
        );

        Ok(new_config)
    }

    /// Key-set diff between two checkpoints' decoded payloads. Non-object
    /// payloads are compared as a single pseudo-key `"$value"`.
    pub async fn compare_checkpoints(&self, a_thread: &str, a: &str, b_thread: &str, b: &str) -> Result<CheckpointDiff> {
        let a_payload = self.get_checkpoint_content(a_thread, a).await?;
        let b_payload = self.get_checkpoint_content(b_thread, b).await?;
        Ok(diff_payloads(a_payload.as_ref(), b_payload.as_ref()))
    }
}

fn diff_payloads(a: Option<&Value>, b: Option<&Value>) -> CheckpointDiff {
    let a_map = as_key_map(a);
    let b_map = as_key_map(b);

    let a_keys: BTreeSet<&String> = a_map.keys().collect();
    let b_keys: BTreeSet<&String> = b_map.keys().collect();

    let added = b_keys.difference(&a_keys).map(|k| (*k).clone()).collect();
    let removed = a_keys.difference(&b_keys).map(|k| (*k).clone()).collect();
    let changed = a_keys
        .intersection(&b_keys)
        .filter(|k| a_map.get(**k) != b_map.get(**k))
        .map(|k| (*k).clone())
        .collect();

    CheckpointDiff { added, removed, changed }
}

fn as_key_map(value: Option<&Value>) -> serde_json::Map<String, Value> {
    match value {
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            let mut map = serde_json::Map::new();
            map.insert("$value".to_string(), other.clone());
            map
        }
        None => serde_json::Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryCheckpointStore;
    use async_trait::async_trait;
    use graph_runtime::GraphRuntimeError;

    struct EchoPatchGraph;

    #[async_trait]
    impl GraphRuntime for EchoPatchGraph {
        async fn ainvoke(&self, input: Value, _config: Value) -> std::result::Result<Value, GraphRuntimeError> {
            let base = input.get("base").cloned().unwrap_or(Value::Null);
            let patch = input.get("patch").cloned().unwrap_or(Value::Null);
            let mut merged = base.as_object().cloned().unwrap_or_default();
            if let Some(patch_obj) = patch.as_object() {
                for (k, v) in patch_obj {
                    merged.insert(k.clone(), v.clone());
                }
            }
            Ok(Value::Object(merged))
        }
    }

    async fn seeded_store() -> (Arc<InMemoryCheckpointStore>, String) {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let config = CheckpointConfig::latest("thread-1");
        for n in 0..3 {
            store
                .put(&config, serde_json::json!({"n": n}), CheckpointMetadata::default(), None)
                .await
                .unwrap();
        }
        (store, "thread-1".to_string())
    }

    #[tokio::test]
    async fn timeline_is_newest_first() {
        let (store, thread_id) = seeded_store().await;
        let traveler = Traveler::new(store.clone());
        let timeline = traveler.get_timeline(&thread_id, None).await.unwrap();
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline[0].step, 0);
        assert_eq!(timeline[2].step, 2);
    }

    #[tokio::test]
    async fn fork_and_correct_applies_patch_and_links_parent() {
        let (store, thread_id) = seeded_store().await;
        let saver: Arc<dyn CheckpointSaver> = store.clone();
        let traveler = Traveler::new(saver);
        let graph = EchoPatchGraph;

        let new_config = traveler
            .fork_and_correct(&graph, &thread_id, 1, serde_json::json!({"corrected": true}), "test fix")
            .await
            .unwrap();

        let latest = store.get(&CheckpointConfig::latest(&thread_id)).await.unwrap().unwrap();
        assert_eq!(latest.checkpoint_id, new_config.checkpoint_id.unwrap());
        assert_eq!(latest.payload, serde_json::json!({"n": 1, "corrected": true}));
        assert!(latest.parent_checkpoint_id.is_some());
    }

    #[tokio::test]
    async fn fork_beyond_history_fails() {
        let (store, thread_id) = seeded_store().await;
        let saver: Arc<dyn CheckpointSaver> = store;
        let traveler = Traveler::new(saver);
        let graph = EchoPatchGraph;

        let err = traveler
            .fork_and_correct(&graph, &thread_id, 10, serde_json::json!({}), "oops")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::CheckpointError::HistoryTooShort { .. }));
    }

    #[test]
    fn compare_detects_added_removed_changed() {
        let a = serde_json::json!({"x": 1, "y": 2});
        let b = serde_json::json!({"x": 1, "y": 3, "z": 4});
        let diff = diff_payloads(Some(&a), Some(&b));
        assert_eq!(diff.added, vec!["z".to_string()]);
        assert_eq!(diff.removed, Vec::<String>::new());
        assert_eq!(diff.changed, vec!["y".to_string()]);
    }
}
