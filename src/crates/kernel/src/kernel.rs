//! The reactive kernel: lifecycle state machine, component registry, and
//! boot/shutdown/hot-reload coordination over the gatekeeper, Cortex,
//! Sniffer, file watcher, and reactor.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use graph_runtime::EventEmitter;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

use crate::cortex::Cortex;
use crate::error::{GatekeeperError, KernelError, Result};
use crate::gatekeeper::{self, OverloadHint};
use crate::reactor::{HandlerId, Reactor, WILDCARD_TOPIC};
use crate::skill::{LoadedSkill, NullSkillLoader, SkillLoader, SkillRegistry};
use crate::sniffer::{InMemoryRuleStore, RuleStore, Sniffer, SnifferRule};
use crate::state::{KernelState, StateMachine};
use crate::watcher::FileWatcher;

const FILE_TOPICS: [&str; 2] = ["file/changed", "file/created"];

/// Collaborators an embedder wires in; every field has a workable default so
/// `KernelConfig::default()` boots a kernel that does nothing but is fully
/// functional for in-process skill registration and tool execution.
pub struct KernelConfig {
    pub skill_loader: Arc<dyn SkillLoader>,
    pub rule_store: Arc<dyn RuleStore>,
    pub watch_roots: Vec<PathBuf>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            skill_loader: Arc::new(NullSkillLoader),
            rule_store: Arc::new(InMemoryRuleStore::default()),
            watch_roots: Vec::new(),
        }
    }
}

struct BootRegistrations {
    cortex_handlers: Vec<HandlerId>,
    sniffer_handlers: Vec<HandlerId>,
}

/// The microkernel. Cheap to clone: every field is `Arc`-shared, so a
/// `Kernel` handle can be threaded to callers the way the teacher threads an
/// `Arc<Kernel>` from `main` rather than reaching for a global singleton.
#[derive(Clone)]
pub struct Kernel {
    state: Arc<StateMachine>,
    skills: Arc<Mutex<SkillRegistry>>,
    cortex: Arc<Cortex>,
    sniffer: Arc<Sniffer>,
    reactor: Reactor,
    watcher: Option<Arc<FileWatcher>>,
    skill_loader: Arc<dyn SkillLoader>,
    rule_store: Arc<dyn RuleStore>,
    rules: Arc<Mutex<Vec<SnifferRule>>>,
    notify_tx: broadcast::Sender<Value>,
    cortex_rebuild: Arc<Mutex<Option<JoinHandle<()>>>>,
    registrations: Arc<Mutex<Option<BootRegistrations>>>,
}

impl Kernel {
    pub fn new(config: KernelConfig) -> Self {
        let (notify_tx, _rx) = broadcast::channel(64);
        let watcher = if config.watch_roots.is_empty() {
            None
        } else {
            Some(Arc::new(FileWatcher::new(config.watch_roots)))
        };

        Self {
            state: Arc::new(StateMachine::new()),
            skills: Arc::new(Mutex::new(SkillRegistry::new())),
            cortex: Arc::new(Cortex::new()),
            sniffer: Arc::new(Sniffer::new()),
            reactor: Reactor::new(),
            watcher,
            skill_loader: config.skill_loader,
            rule_store: config.rule_store,
            rules: Arc::new(Mutex::new(Vec::new())),
            notify_tx,
            cortex_rebuild: Arc::new(Mutex::new(None)),
            registrations: Arc::new(Mutex::new(None)),
        }
    }

    pub fn state(&self) -> KernelState {
        self.state.current()
    }

    pub fn reactor(&self) -> &Reactor {
        &self.reactor
    }

    pub fn cortex(&self) -> &Cortex {
        &self.cortex
    }

    pub fn sniffer(&self) -> &Sniffer {
        &self.sniffer
    }

    pub fn skill_manifests(&self) -> Vec<gatekeeper::SkillManifest> {
        self.skills.lock().unwrap().manifests()
    }

    /// Subscribe to outbound notifications (`tools/listChanged` after
    /// hot-reload, and anything else the kernel broadcasts).
    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.notify_tx.subscribe()
    }

    /// Boot sequence (`on_ready`, §4.9): discover/register skills, build the
    /// Cortex index off the hot path, load Sniffer rules, start the reactor
    /// with the Cortex indexer and Sniffer hooked to file events.
    pub async fn initialize(&self) -> Result<()> {
        self.state.transition_to(KernelState::Initializing)?;

        // Step 1-2: initialize skill context, register loaded skills/commands.
        let discovered = self.skill_loader.discover().await?;
        let manifests: Vec<_> = {
            let mut registry = self.skills.lock().unwrap();
            for skill in discovered {
                registry.register(skill);
            }
            registry.manifests()
        };

        // Step 3: build the Cortex index asynchronously; must not block boot.
        let cortex = self.cortex.clone();
        let handle = tokio::spawn(async move {
            cortex.rebuild(&manifests);
        });
        *self.cortex_rebuild.lock().unwrap() = Some(handle);

        // Step 4: load Sniffer rules from the persisted rule store.
        let rules = self.rule_store.load().await?;
        self.sniffer.load_rules(rules.clone());
        *self.rules.lock().unwrap() = rules;

        // Step 5: start the reactor; hook the Cortex indexer and Sniffer to file events.
        self.reactor.start().await;
        let mut cortex_handlers = Vec::new();
        let mut sniffer_handlers = Vec::new();
        for topic in FILE_TOPICS {
            cortex_handlers.push(self.reactor.register_handler(topic, 10, self.cortex_indexer_handler()));
            sniffer_handlers.push(self.reactor.register_handler(topic, 5, self.sniffer_handler()));
        }
        *self.registrations.lock().unwrap() = Some(BootRegistrations { cortex_handlers, sniffer_handlers });

        if let Some(watcher) = &self.watcher {
            let emitter: Arc<dyn EventEmitter> = Arc::new(self.reactor.clone());
            watcher.start(emitter);
        }

        self.state.transition_to(KernelState::Ready)?;
        self.state.transition_to(KernelState::Running)?;

        // Step 6: log a readiness summary.
        info!(
            skills = self.skills.lock().unwrap().len(),
            sniffer_rules = self.sniffer.rule_count(),
            watching = self.watcher.is_some(),
            "kernel ready"
        );

        Ok(())
    }

    /// A reactor handler that re-indexes the Cortex entry for any skill the
    /// Sniffer's rules match against the changed path.
    fn cortex_indexer_handler(&self) -> crate::reactor::Handler {
        let sniffer = self.sniffer.clone();
        let skills = self.skills.clone();
        let cortex = self.cortex.clone();
        let skill_loader = self.skill_loader.clone();

        Box::new(move |event| {
            let Some(path) = event.payload.get("path").and_then(|p| p.as_str()) else {
                return Ok(());
            };
            for skill_name in sniffer.matches(path) {
                let reloaded = futures::executor::block_on(skill_loader.reload(&skill_name))
                    .map_err(|e| e.to_string())?;
                match reloaded {
                    Some(skill) => {
                        cortex.index_skill(&skill.manifest);
                        skills.lock().unwrap().register(skill);
                    }
                    None => {
                        cortex.remove_skill(&skill_name);
                        skills.lock().unwrap().unregister(&skill_name);
                    }
                }
            }
            Ok(())
        })
    }

    /// The Sniffer's own hook: emits `skill/activated` for every rule match.
    fn sniffer_handler(&self) -> crate::reactor::Handler {
        let sniffer = self.sniffer.clone();
        let reactor = self.reactor.clone();

        Box::new(move |event| {
            let Some(path) = event.payload.get("path").and_then(|p| p.as_str()) else {
                return Ok(());
            };
            for skill_name in sniffer.matches(path) {
                reactor.publish("skill/activated", serde_json::json!({ "skill": skill_name, "path": path }));
            }
            Ok(())
        })
    }

    /// Rebuild a single skill in place and broadcast `tools/listChanged`.
    /// Used both by the file-change hot-reload path and by direct callers.
    pub async fn hot_reload(&self, skill_name: &str) -> Result<()> {
        let reloaded = self.skill_loader.reload(skill_name).await?;
        match reloaded {
            Some(skill) => {
                self.cortex.index_skill(&skill.manifest);
                self.skills.lock().unwrap().register(skill);
            }
            None => {
                self.cortex.remove_skill(skill_name);
                self.skills.lock().unwrap().unregister(skill_name);
            }
        }

        let _ = self.notify_tx.send(serde_json::json!({ "type": "tools/listChanged" }));
        Ok(())
    }

    /// Gatekeeper check + in-process builtin dispatch for `tool_name`
    /// (`<skill>.<command>`). Returns the tool's result, optionally
    /// accompanied by an overload hint the caller may surface.
    pub fn execute_tool(
        &self,
        caller: Option<&str>,
        tool_name: &str,
        input: Value,
        target_under_load: bool,
    ) -> Result<(Value, Option<OverloadHint>)> {
        let manifests = self.skills.lock().unwrap().manifest_lookup();
        let hint = gatekeeper::validate_or_raise(caller, tool_name, &manifests, target_under_load)?;

        let (skill_name, command) = tool_name
            .split_once('.')
            .ok_or_else(|| KernelError::Gatekeeper(GatekeeperError::InvalidToolName(tool_name.to_string())))?;

        let result = self.skills.lock().unwrap().invoke_builtin(skill_name, command, input)?;
        Ok((result, hint))
    }

    /// Shutdown sequence (`on_shutdown`, §4.9).
    pub async fn shutdown(&self) -> Result<()> {
        self.state.transition_to(KernelState::ShuttingDown)?;

        // Step 1: cancel background tasks and await their cancellation.
        if let Some(handle) = self.cortex_rebuild.lock().unwrap().take() {
            handle.abort();
            let _ = handle.await;
        }

        // Step 2: unregister the Sniffer (and Cortex indexer) from the reactor.
        if let Some(regs) = self.registrations.lock().unwrap().take() {
            for id in regs.sniffer_handlers.iter().chain(regs.cortex_handlers.iter()) {
                self.reactor.unregister_handler(id);
            }
        }

        // Step 3: stop the reactor (drains the queue, dispatches the shutdown event).
        self.reactor.stop().await;

        // Step 4: stop the file watcher.
        if let Some(watcher) = &self.watcher {
            watcher.stop().await;
        }

        // Step 5: persist whatever persistable state the components advertise.
        let rules = self.rules.lock().unwrap().clone();
        self.rule_store.save(&rules).await?;

        // Step 6: unregister skills, clear the component registry.
        self.skills.lock().unwrap().clear();
        self.cortex.rebuild(&[]);

        self.state.transition_to(KernelState::Stopped)?;
        Ok(())
    }
}

/// Per-topic removal beats wildcard-only removal: see
/// [`crate::reactor::Reactor::unregister_handler`]'s own doc comment for the
/// Open Question this decides.
pub fn register_wildcard_observer(kernel: &Kernel, handler: crate::reactor::Handler) -> HandlerId {
    kernel.reactor().register_handler(WILDCARD_TOPIC, 0, handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skill::SkillCommand;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticLoader;

    #[async_trait]
    impl SkillLoader for StaticLoader {
        async fn discover(&self) -> Result<Vec<LoadedSkill>> {
            let manifest = gatekeeper::SkillManifest {
                name: "notes".to_string(),
                description: "search the link graph".to_string(),
                commands: vec!["search".to_string()],
                permissions: vec!["notes.search".to_string()],
            };
            Ok(vec![LoadedSkill::new(manifest).with_command(
                "search",
                SkillCommand::Builtin(Arc::new(|input| Ok(input))),
            )])
        }

        async fn reload(&self, skill_name: &str) -> Result<Option<LoadedSkill>> {
            if skill_name == "notes" {
                Ok(Some(self.discover().await?.remove(0)))
            } else {
                Ok(None)
            }
        }
    }

    fn test_config() -> KernelConfig {
        KernelConfig { skill_loader: Arc::new(StaticLoader), ..KernelConfig::default() }
    }

    #[tokio::test]
    async fn boots_to_running_and_indexes_the_cortex() {
        let kernel = Kernel::new(test_config());
        kernel.initialize().await.unwrap();
        assert_eq!(kernel.state(), KernelState::Running);

        // the Cortex build was spawned off the boot path; give it a tick.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(kernel.cortex().len(), 1);

        kernel.shutdown().await.unwrap();
        assert_eq!(kernel.state(), KernelState::Stopped);
    }

    #[tokio::test]
    async fn execute_tool_runs_the_builtin_and_grants_root() {
        let kernel = Kernel::new(test_config());
        kernel.initialize().await.unwrap();

        let (result, hint) = kernel
            .execute_tool(None, "notes.search", serde_json::json!({"q": "graph"}), false)
            .unwrap();
        assert_eq!(result, serde_json::json!({"q": "graph"}));
        assert!(hint.is_none());

        kernel.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn execute_tool_denies_an_ungranted_caller() {
        let kernel = Kernel::new(test_config());
        kernel.initialize().await.unwrap();

        let err = kernel
            .execute_tool(Some("stranger"), "notes.search", Value::Null, false)
            .unwrap_err();
        assert!(matches!(err, KernelError::Gatekeeper(GatekeeperError::IdentityVerificationFailed(_))));

        kernel.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn hot_reload_broadcasts_tools_list_changed() {
        let kernel = Kernel::new(test_config());
        kernel.initialize().await.unwrap();
        let mut rx = kernel.subscribe();

        kernel.hot_reload("notes").await.unwrap();
        let notification = rx.recv().await.unwrap();
        assert_eq!(notification["type"], "tools/listChanged");

        kernel.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_unregisters_handlers_and_persists_rules() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let kernel = Kernel::new(test_config());
        kernel.initialize().await.unwrap();

        register_wildcard_observer(
            &kernel,
            Box::new(move |_event| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        kernel.shutdown().await.unwrap();
        // stop() dispatches exactly one shutdown event to the wildcard observer.
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
