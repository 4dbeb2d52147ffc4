//! Persistent stats cache, backed by `redis` (grounded in the retrieval
//! pack's `dashflow-redis`-style crates, which use `redis` for exactly this
//! kind of keyed envelope read/write against an external store). Degrades
//! to in-memory-only operation — stats() simply falls through to the
//! engine every time — when no cache URL resolves.

use std::sync::atomic::{AtomicBool, Ordering};

use link_graph::model::GraphStats;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{BackendError, Result};

pub const CACHE_SCHEMA: &str = "omni.link_graph.stats.cache.v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsCacheEnvelope {
    pub schema: String,
    pub source_key: String,
    pub updated_at_unix: i64,
    pub stats: GraphStats,
}

/// Outcome of a cache read, distinguishing "reachable but empty/expired"
/// from "no cache configured at all" for the schema-signal phase record.
pub enum CacheLookup {
    Hit(StatsCacheEnvelope),
    Miss,
    Unavailable,
}

pub struct StatsCache {
    manager: Option<redis::aio::ConnectionManager>,
    key_prefix: String,
    ttl_seconds: u64,
    warned_once: AtomicBool,
}

impl StatsCache {
    /// Connects eagerly so later calls never pay connection-establishment
    /// latency; a connection failure degrades to `Unavailable` rather than
    /// propagating, matching the "without a reachable store the LGE
    /// operates without persistent stats caching" contract.
    pub async fn connect(url: Option<&str>, key_prefix: String, ttl_seconds: u64) -> Self {
        let manager = match url {
            Some(url) => match redis::Client::open(url) {
                Ok(client) => match client.get_connection_manager().await {
                    Ok(manager) => Some(manager),
                    Err(e) => {
                        warn!(error = %e, "stats cache unreachable, degrading to in-memory-only operation");
                        None
                    }
                },
                Err(e) => {
                    warn!(error = %e, "invalid stats cache url, degrading to in-memory-only operation");
                    None
                }
            },
            None => None,
        };

        let connected = manager.is_some();
        Self {
            manager,
            key_prefix,
            ttl_seconds,
            warned_once: AtomicBool::new(connected),
        }
    }

    fn key(&self, source_key: &str) -> String {
        format!("{}:{}", self.key_prefix, source_key)
    }

    fn warn_degraded_once(&self) {
        if self.warned_once.swap(true, Ordering::Relaxed) {
            return;
        }
        warn!("no stats cache url configured, operating without persistent stats caching");
    }

    pub async fn get(&self, source_key: &str) -> Result<CacheLookup> {
        let Some(manager) = &self.manager else {
            self.warn_degraded_once();
            return Ok(CacheLookup::Unavailable);
        };
        let mut conn = manager.clone();
        let raw: Option<String> = conn
            .get(self.key(source_key))
            .await
            .map_err(|e| BackendError::Cache(e.to_string()))?;

        let Some(raw) = raw else {
            return Ok(CacheLookup::Miss);
        };
        let envelope: StatsCacheEnvelope = serde_json::from_str(&raw)?;

        if envelope.schema != CACHE_SCHEMA || envelope.source_key != source_key {
            return Ok(CacheLookup::Miss);
        }
        let age = now_unix() - envelope.updated_at_unix;
        if age < 0 || age as u64 > self.ttl_seconds {
            return Ok(CacheLookup::Miss);
        }

        Ok(CacheLookup::Hit(envelope))
    }

    pub async fn set(&self, source_key: &str, stats: GraphStats) -> Result<()> {
        let Some(manager) = &self.manager else {
            return Ok(());
        };
        let envelope = StatsCacheEnvelope {
            schema: CACHE_SCHEMA.to_string(),
            source_key: source_key.to_string(),
            updated_at_unix: now_unix(),
            stats,
        };
        let raw = serde_json::to_string(&envelope)?;
        let mut conn = manager.clone();
        let _: () = conn
            .set_ex(self.key(source_key), raw, self.ttl_seconds)
            .await
            .map_err(|e| BackendError::Cache(e.to_string()))?;
        Ok(())
    }

    /// Called after every successful index mutation, per the contract that
    /// "each successful mutation invalidates the persistent stats cache".
    pub async fn invalidate(&self, source_key: &str) -> Result<()> {
        let Some(manager) = &self.manager else {
            return Ok(());
        };
        let mut conn = manager.clone();
        let _: () = conn.del(self.key(source_key)).await.map_err(|e| BackendError::Cache(e.to_string()))?;
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_some()
    }
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disconnected_cache_reports_unavailable() {
        let cache = StatsCache::connect(None, "link_graph".to_string(), 3600).await;
        assert!(!cache.is_connected());
        let lookup = cache.get("some-key").await.unwrap();
        assert!(matches!(lookup, CacheLookup::Unavailable));
    }

    #[tokio::test]
    async fn disconnected_cache_set_and_invalidate_are_no_ops() {
        let cache = StatsCache::connect(None, "link_graph".to_string(), 3600).await;
        cache.set("k", GraphStats::default()).await.unwrap();
        cache.invalidate("k").await.unwrap();
    }
}
