//! The file watcher: a polling shim over the watched roots.
//!
//! No filesystem-notification crate sits in the pack's dependency set, so
//! this mirrors the Reactor's own 500ms `tokio::time` poll idiom: it
//! periodically re-walks the watched roots with `walkdir` and diffs
//! SHA-1 fingerprints, the same fingerprint-based dirty detection the
//! link-graph engine's delta refresh uses, publishing `file/changed` and
//! `file/created` events onto the kernel's event bus.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use graph_runtime::EventEmitter;
use sha1::{Digest, Sha1};
use tokio::task::JoinHandle;
use walkdir::WalkDir;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn scan_once(roots: &[PathBuf]) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for root in roots {
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path().to_string_lossy().replace('\\', "/");
            if let Ok(bytes) = std::fs::read(entry.path()) {
                out.insert(path, fingerprint(&bytes));
            }
        }
    }
    out
}

/// Polls `roots` on an interval, publishing `file/created` for new paths and
/// `file/changed` for paths whose fingerprint moved.
pub struct FileWatcher {
    roots: Vec<PathBuf>,
    interval: Duration,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl FileWatcher {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self::with_interval(roots, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(roots: Vec<PathBuf>, interval: Duration) -> Self {
        Self {
            roots,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Start the poll loop, publishing changes through `events`. Not
    /// idempotent across a `stop()`-less double start (mirrors the
    /// reactor's own single-start contract).
    pub fn start(&self, events: Arc<dyn EventEmitter>) {
        self.running.store(true, Ordering::SeqCst);
        let roots = self.roots.clone();
        let interval = self.interval;
        let running = self.running.clone();

        let handle = tokio::spawn(async move {
            let mut known = scan_once(&roots);
            loop {
                tokio::time::sleep(interval).await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                let current = scan_once(&roots);
                for (path, fp) in &current {
                    match known.get(path) {
                        None => events.emit("file/created", serde_json::json!({ "path": path })),
                        Some(prev) if prev != fp => {
                            events.emit("file/changed", serde_json::json!({ "path": path }))
                        }
                        _ => {}
                    }
                }
                known = current;
            }
        });

        *self.worker.lock().unwrap() = Some(handle);
    }

    /// Stop the poll loop and await its task's cancellation.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let handle = self.worker.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
