//! The event reactor: a single-threaded cooperative consumer over a bounded
//! event queue, dispatching to priority-ordered, per-topic handler lists.
//!
//! Grounded in the teacher's `orca::events::ExecutionEvent` tagged-event
//! idiom, generalized to a free-form namespaced topic since skills register
//! arbitrary topics the reactor knows nothing about ahead of time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use graph_runtime::EventEmitter;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const DEFAULT_QUEUE_CAPACITY: usize = 1000;
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A wildcard topic: handlers registered here see every event, dispatched
/// after that event's topic-specific handlers.
pub const WILDCARD_TOPIC: &str = "*";

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub topic: String,
    pub payload: Value,
}

impl Event {
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self { topic: topic.into(), payload }
    }
}

/// A reactor-invoked callback. Returning `Err` counts as a handled failure;
/// it never stops the reactor or other handlers.
pub type Handler = Box<dyn Fn(&Event) -> std::result::Result<(), String> + Send + Sync>;

/// Identifies a previously registered handler for [`Reactor::unregister_handler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerId {
    topic: String,
    id: u64,
}

struct RegisteredHandler {
    id: u64,
    priority: i32,
    handler: Handler,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReactorStats {
    pub dispatched: u64,
    pub handler_errors: u64,
}

type HandlerTable = Arc<Mutex<HashMap<String, Vec<RegisteredHandler>>>>;
type WildcardList = Arc<Mutex<Vec<RegisteredHandler>>>;

/// The reactor itself. Cheap to clone: internal state is `Arc`-shared.
#[derive(Clone)]
pub struct Reactor {
    topic_handlers: HandlerTable,
    wildcard_handlers: WildcardList,
    next_id: Arc<AtomicU64>,
    sender: mpsc::Sender<Event>,
    receiver: Arc<Mutex<Option<mpsc::Receiver<Event>>>>,
    stats: Arc<Mutex<ReactorStats>>,
    running: Arc<AtomicBool>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Reactor {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            topic_handlers: Arc::new(Mutex::new(HashMap::new())),
            wildcard_handlers: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(0)),
            sender,
            receiver: Arc::new(Mutex::new(Some(receiver))),
            stats: Arc::new(Mutex::new(ReactorStats::default())),
            running: Arc::new(AtomicBool::new(false)),
            worker: Arc::new(Mutex::new(None)),
        }
    }

    /// Register a handler on `topic` (or [`WILDCARD_TOPIC`]), ordered within
    /// its list by priority descending, ties broken by registration order.
    pub fn register_handler(&self, topic: &str, priority: i32, handler: Handler) -> HandlerId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let registered = RegisteredHandler { id, priority, handler };

        if topic == WILDCARD_TOPIC {
            let mut list = self.wildcard_handlers.lock();
            list.push(registered);
            list.sort_by(|a, b| b.priority.cmp(&a.priority));
        } else {
            let mut table = self.topic_handlers.lock();
            let list = table.entry(topic.to_string()).or_default();
            list.push(registered);
            list.sort_by(|a, b| b.priority.cmp(&a.priority));
        }

        HandlerId { topic: topic.to_string(), id }
    }

    /// Remove the handler named by `handler_id` from its specific topic's
    /// list (or the wildcard list, when it was registered on `"*"`).
    /// Idempotent: removing an already-removed id is a no-op returning `false`.
    pub fn unregister_handler(&self, handler_id: &HandlerId) -> bool {
        if handler_id.topic == WILDCARD_TOPIC {
            let mut list = self.wildcard_handlers.lock();
            let before = list.len();
            list.retain(|h| h.id != handler_id.id);
            before != list.len()
        } else {
            let mut table = self.topic_handlers.lock();
            match table.get_mut(&handler_id.topic) {
                Some(list) => {
                    let before = list.len();
                    list.retain(|h| h.id != handler_id.id);
                    before != list.len()
                }
                None => false,
            }
        }
    }

    /// Publish an event onto the bounded inbound queue. Returns `false` if
    /// the queue is full or the reactor has not been started.
    pub fn publish(&self, topic: impl Into<String>, payload: Value) -> bool {
        self.sender.try_send(Event::new(topic, payload)).is_ok()
    }

    pub fn stats(&self) -> ReactorStats {
        *self.stats.lock()
    }

    /// Start the consumer loop. Not idempotent: calling twice without an
    /// intervening `stop()` panics, since the receiver is taken once.
    pub async fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        let mut receiver = self
            .receiver
            .lock()
            .take()
            .expect("reactor already started");

        let topic_handlers = self.topic_handlers.clone();
        let wildcard_handlers = self.wildcard_handlers.clone();
        let stats = self.stats.clone();
        let running = self.running.clone();

        let handle = tokio::spawn(async move {
            loop {
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                tokio::select! {
                    event = receiver.recv() => {
                        match event {
                            Some(event) => dispatch(&event, &topic_handlers, &wildcard_handlers, &stats),
                            None => break,
                        }
                    }
                    _ = tokio::time::sleep(POLL_INTERVAL) => {}
                }
            }
        });

        *self.worker.lock() = Some(handle);
    }

    /// Emit a final `system/shutdown` event to every registered handler
    /// (topic-specific and wildcard), then stop the consumer loop.
    pub async fn stop(&self) {
        let shutdown = Event::new("system/shutdown", Value::Null);
        self.dispatch_to_every_handler(&shutdown);

        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.await;
        }
    }

    fn dispatch_to_every_handler(&self, event: &Event) {
        let table = self.topic_handlers.lock();
        for list in table.values() {
            run_handlers(event, list, &self.stats);
        }
        let wildcard = self.wildcard_handlers.lock();
        run_handlers(event, &wildcard, &self.stats);
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}

/// Lets the checkpoint/time-travel and auto-fix crates publish onto this
/// reactor's bus without depending on the kernel's other modules.
impl EventEmitter for Reactor {
    fn emit(&self, topic: &str, payload: Value) {
        self.publish(topic, payload);
    }
}

fn dispatch(event: &Event, topic_handlers: &HandlerTable, wildcard_handlers: &WildcardList, stats: &Arc<Mutex<ReactorStats>>) {
    {
        let table = topic_handlers.lock();
        if let Some(list) = table.get(&event.topic) {
            run_handlers(event, list, stats);
        }
    }
    let wildcard = wildcard_handlers.lock();
    run_handlers(event, &wildcard, stats);
}

fn run_handlers(event: &Event, handlers: &[RegisteredHandler], stats: &Arc<Mutex<ReactorStats>>) {
    for registered in handlers {
        let outcome = (registered.handler)(event);
        let mut stats = stats.lock();
        stats.dispatched += 1;
        if outcome.is_err() {
            stats.handler_errors += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn recording_handler(log: Arc<StdMutex<Vec<&'static str>>>, label: &'static str) -> Handler {
        Box::new(move |_event| {
            log.lock().unwrap().push(label);
            Ok(())
        })
    }

    #[tokio::test]
    async fn dispatch_honors_priority_then_wildcard() {
        let reactor = Reactor::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        reactor.register_handler("file/changed", 1, recording_handler(log.clone(), "low"));
        reactor.register_handler("file/changed", 10, recording_handler(log.clone(), "high"));
        reactor.register_handler(WILDCARD_TOPIC, 999, recording_handler(log.clone(), "wild"));

        reactor.start().await;
        reactor.publish("file/changed", serde_json::json!({}));
        tokio::time::sleep(Duration::from_millis(50)).await;
        reactor.stop().await;

        let log = log.lock().unwrap();
        assert_eq!(log[0], "high");
        assert_eq!(log[1], "low");
        assert_eq!(log[2], "wild");
    }

    #[tokio::test]
    async fn unregister_removes_only_the_specific_topic_handler() {
        let reactor = Reactor::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        let topic_id = reactor.register_handler("file/changed", 1, recording_handler(log.clone(), "topic"));
        reactor.register_handler(WILDCARD_TOPIC, 1, recording_handler(log.clone(), "wild"));

        assert!(reactor.unregister_handler(&topic_id));
        assert!(!reactor.unregister_handler(&topic_id));

        reactor.start().await;
        reactor.publish("file/changed", serde_json::json!({}));
        tokio::time::sleep(Duration::from_millis(50)).await;
        reactor.stop().await;

        let log = log.lock().unwrap();
        assert_eq!(log.as_slice(), &["wild", "wild"]);
    }

    #[tokio::test]
    async fn handler_errors_are_counted_and_never_halt_dispatch() {
        let reactor = Reactor::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        reactor.register_handler(
            "file/changed",
            1,
            Box::new(|_event| Err("boom".to_string())),
        );
        reactor.register_handler("file/changed", 0, recording_handler(log.clone(), "after-failure"));

        reactor.start().await;
        reactor.publish("file/changed", serde_json::json!({}));
        tokio::time::sleep(Duration::from_millis(50)).await;
        reactor.stop().await;

        assert_eq!(log.lock().unwrap().as_slice(), &["after-failure"]);
        let stats = reactor.stats();
        assert_eq!(stats.handler_errors, 1);
    }

    #[tokio::test]
    async fn stop_notifies_every_handler_across_topics_exactly_once() {
        let reactor = Reactor::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        reactor.register_handler("file/changed", 1, recording_handler(log.clone(), "a"));
        reactor.register_handler("file/created", 1, recording_handler(log.clone(), "b"));
        reactor.register_handler(WILDCARD_TOPIC, 1, recording_handler(log.clone(), "c"));

        reactor.start().await;
        reactor.stop().await;

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 3);
        assert!(log.contains(&"a"));
        assert!(log.contains(&"b"));
        assert!(log.contains(&"c"));
    }
}
