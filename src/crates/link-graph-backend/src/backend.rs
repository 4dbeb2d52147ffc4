//! Owns notebook root resolution, cache wiring, and phase instrumentation
//! around a [`LinkGraphEngine`]. Operations delegate to the engine but add
//! the persistent stats cache, a deterministic cache-source key, and a
//! schema signal published at initialization.

use std::time::Instant;

use link_graph::model::{
    Direction, GraphStats, Neighbor, LinkGraphMetadata, PhaseRecord, RefreshResult, SearchOptions,
    TocEntry,
};
use link_graph::scan::ScanConfig;
use link_graph::{LinkGraphEngine, SearchOutcome};
use parking_lot::RwLock;
use serde_json::json;
use sha1::{Digest, Sha1};

use crate::cache::{CacheLookup, StatsCache, CACHE_SCHEMA};
use crate::config::BackendConfig;
use crate::error::Result;
use crate::phase::PhaseRecorder;

pub struct LinkGraphBackend {
    config: BackendConfig,
    engine: RwLock<LinkGraphEngine>,
    cache: StatsCache,
    phases: PhaseRecorder,
    injected: bool,
}

impl LinkGraphBackend {
    /// Builds a backend against `config`, optionally reusing an
    /// already-populated `injected` engine (the unit-test path: injection
    /// also disables the persistent stats cache read on `stats()`).
    pub async fn new(config: BackendConfig, injected: Option<LinkGraphEngine>) -> Result<Self> {
        let was_injected = injected.is_some();
        let t0 = Instant::now();

        let engine = match injected {
            Some(engine) => engine,
            None => {
                let scan_config = ScanConfig {
                    notebook_root: config.notebook_root.clone(),
                    include_dirs: config.include_dirs.clone(),
                    exclude_dirs: config.exclude_dirs.clone(),
                };
                let mut engine = LinkGraphEngine::new(scan_config);
                engine.refresh_plan_apply(&[], true, usize::MAX)?;
                engine
            }
        };

        let phases = PhaseRecorder::new();
        phases.record(
            "engine.init",
            true,
            json!({ "reused": was_injected }),
            t0,
        );

        let cache = StatsCache::connect(
            config.cache_url.as_deref(),
            config.cache_key_prefix.clone(),
            config.cache_ttl_seconds,
        )
        .await;

        let fingerprint = schema_fingerprint();
        phases.push(PhaseRecord::new(
            "cache.schema",
            0,
            true,
            json!({
                "schema_version": CACHE_SCHEMA,
                "fingerprint": fingerprint,
                "source": "rust_missing_fingerprint",
                "cache_status": "unknown",
                "cache_connected": cache.is_connected(),
            }),
        ));

        Ok(Self {
            config,
            engine: RwLock::new(engine),
            cache,
            phases,
            injected: was_injected,
        })
    }

    pub fn phases(&self) -> Vec<PhaseRecord> {
        self.phases.snapshot()
    }

    pub fn drain_phases(&self) -> Vec<PhaseRecord> {
        self.phases.drain()
    }

    pub fn cache_source_key(&self) -> String {
        self.config.cache_source_key()
    }

    pub fn search_planned(&self, query: &str, limit: usize, options: SearchOptions) -> Result<SearchOutcome> {
        let t0 = Instant::now();
        let result = self.engine.read().search_planned(query, limit, options);
        self.phases.record("search_planned", result.is_ok(), json!({ "query": query }), t0);
        Ok(result?)
    }

    pub fn neighbors(&self, stem: &str, direction: Direction, hops: u32, limit: usize) -> Result<Vec<Neighbor>> {
        let t0 = Instant::now();
        let result = self.engine.read().neighbors(stem, direction, hops, limit);
        self.phases.record("neighbors", result.is_ok(), json!({ "stem": stem }), t0);
        Ok(result?)
    }

    pub fn related(&self, stem: &str, max_distance: u32, limit: usize) -> Result<Vec<Neighbor>> {
        let t0 = Instant::now();
        let result = self.engine.read().related(stem, max_distance, limit);
        self.phases.record("related", result.is_ok(), json!({ "stem": stem }), t0);
        Ok(result?)
    }

    pub fn metadata(&self, stem: &str) -> Result<Option<LinkGraphMetadata>> {
        let t0 = Instant::now();
        let result = self.engine.read().metadata(stem);
        self.phases.record("metadata", result.is_ok(), json!({ "stem": stem }), t0);
        Ok(result?)
    }

    pub fn toc(&self, limit: usize) -> Result<Vec<TocEntry>> {
        let t0 = Instant::now();
        let result = self.engine.read().toc(limit);
        self.phases.record("toc", result.is_ok(), json!({ "limit": limit }), t0);
        Ok(result?)
    }

    /// `stats()` first attempts a persistent-cache read (skipped entirely
    /// when this backend wraps an injected engine); on hit it returns the
    /// cached payload without invoking the engine at all.
    pub async fn stats(&self) -> Result<GraphStats> {
        let source_key = self.cache_source_key();

        if !self.injected {
            let t0 = Instant::now();
            match self.cache.get(&source_key).await {
                Ok(CacheLookup::Hit(envelope)) => {
                    self.phases.record(
                        "stats.cache.get",
                        true,
                        json!({ "cache_hit": true }),
                        t0,
                    );
                    return Ok(envelope.stats);
                }
                Ok(CacheLookup::Miss) => {
                    self.phases.record("stats.cache.get", true, json!({ "cache_hit": false }), t0);
                }
                Ok(CacheLookup::Unavailable) => {
                    self.phases.record("stats.cache.get", true, json!({ "cache_hit": false, "cache_unavailable": true }), t0);
                }
                Err(e) => {
                    self.phases.record("stats.cache.get", false, json!({ "error": e.to_string() }), t0);
                }
            }
        }

        let t1 = Instant::now();
        let stats = self.engine.read().stats()?;
        self.phases.record("stats.compute", true, json!({}), t1);

        if !self.injected {
            let t2 = Instant::now();
            let write = self.cache.set(&source_key, stats).await;
            self.phases.record("stats.cache.set", write.is_ok(), json!({}), t2);
        }

        Ok(stats)
    }

    /// Runs the engine's `refresh_plan_apply` verbatim, replays its events
    /// to the local phase recorder, and invalidates the persistent stats
    /// cache on any successful mutation.
    pub async fn refresh_plan_apply(
        &self,
        changed_paths: &[String],
        force_full: bool,
        full_rebuild_threshold: usize,
    ) -> Result<RefreshResult> {
        let result = {
            let mut engine = self.engine.write();
            engine.refresh_plan_apply(changed_paths, force_full, full_rebuild_threshold)?
        };

        for event in &result.events {
            self.phases.push(event.clone());
        }

        if result.mode != link_graph::model::RefreshMode::Noop {
            let source_key = self.cache_source_key();
            let t0 = Instant::now();
            let invalidated = self.cache.invalidate(&source_key).await;
            self.phases.record("stats.cache.invalidate", invalidated.is_ok(), json!({}), t0);
        }

        Ok(result)
    }
}

fn schema_fingerprint() -> String {
    let mut hasher = Sha1::new();
    hasher.update(CACHE_SCHEMA.as_bytes());
    let digest = hasher.finalize();
    format!("{:x}", digest)[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use link_graph::model::SearchOptions as Opts;
    use std::collections::HashSet;

    fn write_note(dir: &std::path::Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    async fn seeded_backend() -> (tempfile::TempDir, LinkGraphBackend) {
        let dir = tempfile::tempdir().unwrap();
        write_note(dir.path(), "a.md", "---\nid: a\ntitle: A\n---\n# Intro\nHello.\n");

        let config = BackendConfig {
            notebook_root: dir.path().to_path_buf(),
            include_dirs: None,
            exclude_dirs: HashSet::new(),
            cache_url: None,
            cache_key_prefix: "test".to_string(),
            cache_ttl_seconds: 3600,
        };
        let backend = LinkGraphBackend::new(config, None).await.unwrap();
        (dir, backend)
    }

    #[tokio::test]
    async fn init_records_engine_init_and_cache_schema_phases() {
        let (_dir, backend) = seeded_backend().await;
        let phases = backend.phases();
        assert!(phases.iter().any(|p| p.phase == "engine.init"));
        assert!(phases.iter().any(|p| p.phase == "cache.schema"));
    }

    #[tokio::test]
    async fn stats_falls_back_to_engine_without_reachable_cache() {
        let (_dir, backend) = seeded_backend().await;
        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.total_notes, 1);
    }

    #[tokio::test]
    async fn search_delegates_and_records_a_phase() {
        let (_dir, backend) = seeded_backend().await;
        let outcome = backend.search_planned("hello", 10, Opts::default()).unwrap();
        assert!(!outcome.hits.is_empty());
        assert!(backend.phases().iter().any(|p| p.phase == "search_planned"));
    }

    #[tokio::test]
    async fn refresh_threshold_exceeded_invalidates_cache_best_effort() {
        let (_dir, backend) = seeded_backend().await;
        let result = backend.refresh_plan_apply(&["a.md".to_string()], false, 1).await.unwrap();
        assert_eq!(result.mode, link_graph::model::RefreshMode::Full);
        assert!(backend.phases().iter().any(|p| p.phase == "stats.cache.invalidate"));
    }

    #[tokio::test]
    async fn noop_refresh_does_not_invalidate_cache() {
        let (_dir, backend) = seeded_backend().await;
        backend.drain_phases();
        let result = backend.refresh_plan_apply(&[], false, 100).await.unwrap();
        assert_eq!(result.mode, link_graph::model::RefreshMode::Noop);
        assert!(!backend.phases().iter().any(|p| p.phase == "stats.cache.invalidate"));
    }
}
