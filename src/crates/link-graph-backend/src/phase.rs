//! Phase instrumentation: every public backend operation records at least
//! one `PhaseRecord`. Recording is best-effort and never raises — a
//! recorder is just an in-memory `Vec` guarded by a mutex.

use std::sync::Mutex;
use std::time::Instant;

use link_graph::model::PhaseRecord;
use serde_json::Value;

#[derive(Default)]
pub struct PhaseRecorder {
    events: Mutex<Vec<PhaseRecord>>,
}

impl PhaseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: PhaseRecord) {
        if let Ok(mut events) = self.events.lock() {
            events.push(record);
        }
    }

    pub fn record(&self, phase: &str, success: bool, extra: Value, start: Instant) {
        self.push(PhaseRecord::new(phase, start.elapsed().as_millis() as u64, success, extra));
    }

    pub fn drain(&self) -> Vec<PhaseRecord> {
        self.events.lock().map(|mut e| std::mem::take(&mut *e)).unwrap_or_default()
    }

    pub fn snapshot(&self) -> Vec<PhaseRecord> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_accumulate_and_drain_clears() {
        let recorder = PhaseRecorder::new();
        recorder.record("engine.init", true, json!({}), Instant::now());
        recorder.record("cache.schema", true, json!({ "cache_status": "miss" }), Instant::now());
        assert_eq!(recorder.snapshot().len(), 2);
        let drained = recorder.drain();
        assert_eq!(drained.len(), 2);
        assert!(recorder.snapshot().is_empty());
    }
}
