//! Loaded skills and the kernel's component registry.
//!
//! Skill *discovery* (YAML/Markdown manifests, command scripts on disk) is
//! explicitly out of scope for this core — per the Design Notes, the
//! source's dynamic-dispatch-via-decorators idiom for registering a skill's
//! commands at runtime maps here to a sealed tagged union the kernel can
//! match over without any dynamic lookup, with discovery itself pushed
//! behind the [`SkillLoader`] collaborator trait an embedder supplies.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{KernelError, Result};
use crate::gatekeeper::SkillManifest;

/// One command a loaded skill exposes, as a sealed variant rather than a
/// dynamically dispatched callback table.
pub enum SkillCommand {
    /// Implemented in-process; invoked directly.
    Builtin(Arc<dyn Fn(Value) -> std::result::Result<Value, String> + Send + Sync>),
    /// Resolved to an external script path, invoked out-of-process by the embedder.
    Script { path: String },
    /// Delegates to another system entirely (e.g. an MCP server) by name.
    External { target: String },
}

impl std::fmt::Debug for SkillCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Builtin(_) => write!(f, "SkillCommand::Builtin(..)"),
            Self::Script { path } => f.debug_struct("SkillCommand::Script").field("path", path).finish(),
            Self::External { target } => f.debug_struct("SkillCommand::External").field("target", target).finish(),
        }
    }
}

/// A skill's manifest plus its resolved per-command handler table.
pub struct LoadedSkill {
    pub manifest: SkillManifest,
    pub commands: HashMap<String, SkillCommand>,
}

impl LoadedSkill {
    pub fn new(manifest: SkillManifest) -> Self {
        Self { manifest, commands: HashMap::new() }
    }

    pub fn with_command(mut self, name: impl Into<String>, command: SkillCommand) -> Self {
        self.commands.insert(name.into(), command);
        self
    }
}

/// Discovers and (re)loads skills. The core provides no YAML/Markdown
/// manifest parser of its own — an embedder supplies one through this seam.
#[async_trait]
pub trait SkillLoader: Send + Sync {
    /// Discover every skill available at boot.
    async fn discover(&self) -> Result<Vec<LoadedSkill>>;

    /// Reload a single named skill (hot-reload path). `Ok(None)` means the
    /// skill no longer exists and should be unregistered.
    async fn reload(&self, skill_name: &str) -> Result<Option<LoadedSkill>>;
}

/// A [`SkillLoader`] that discovers nothing — the default when an embedder
/// has not wired a real manifest source, and the common case in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSkillLoader;

#[async_trait]
impl SkillLoader for NullSkillLoader {
    async fn discover(&self) -> Result<Vec<LoadedSkill>> {
        Ok(Vec::new())
    }

    async fn reload(&self, _skill_name: &str) -> Result<Option<LoadedSkill>> {
        Ok(None)
    }
}

/// The kernel's component registry: every currently loaded skill, keyed by name.
#[derive(Default)]
pub struct SkillRegistry {
    skills: HashMap<String, LoadedSkill>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, skill: LoadedSkill) {
        self.skills.insert(skill.manifest.name.clone(), skill);
    }

    pub fn unregister(&mut self, name: &str) -> Option<LoadedSkill> {
        self.skills.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&LoadedSkill> {
        self.skills.get(name)
    }

    pub fn manifests(&self) -> Vec<SkillManifest> {
        self.skills.values().map(|s| s.manifest.clone()).collect()
    }

    pub fn manifest_lookup(&self) -> HashMap<String, SkillManifest> {
        self.skills
            .iter()
            .map(|(name, skill)| (name.clone(), skill.manifest.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn clear(&mut self) {
        self.skills.clear();
    }

    /// Invoke `command` on `skill_name` with a `Builtin` handler; `Script`/
    /// `External` commands are not runnable in-process and return
    /// `UnknownSkill` as there is no embedder-supplied executor wired here.
    pub fn invoke_builtin(&self, skill_name: &str, command: &str, input: Value) -> Result<Value> {
        let skill = self.skills.get(skill_name).ok_or_else(|| KernelError::UnknownSkill(skill_name.to_string()))?;
        match skill.commands.get(command) {
            Some(SkillCommand::Builtin(f)) => {
                f(input).map_err(|e| KernelError::ResourceUnavailable(e))
            }
            Some(_) => Err(KernelError::ResourceUnavailable(format!(
                "{skill_name}.{command} is not a builtin command"
            ))),
            None => Err(KernelError::UnknownSkill(format!("{skill_name}.{command}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(name: &str) -> SkillManifest {
        SkillManifest {
            name: name.to_string(),
            description: format!("{name} skill"),
            commands: vec!["run".to_string()],
            permissions: vec![format!("{name}.run")],
        }
    }

    #[test]
    fn register_and_lookup_round_trips() {
        let mut registry = SkillRegistry::new();
        registry.register(LoadedSkill::new(manifest("notes")));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("notes").is_some());
        assert!(registry.get("ghost").is_none());
    }

    #[test]
    fn unregister_removes_and_returns() {
        let mut registry = SkillRegistry::new();
        registry.register(LoadedSkill::new(manifest("notes")));
        let removed = registry.unregister("notes");
        assert!(removed.is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn invoke_builtin_runs_the_handler() {
        let mut registry = SkillRegistry::new();
        let skill = LoadedSkill::new(manifest("notes")).with_command(
            "run",
            SkillCommand::Builtin(Arc::new(|input| Ok(input))),
        );
        registry.register(skill);
        let result = registry.invoke_builtin("notes", "run", serde_json::json!({"ok": true})).unwrap();
        assert_eq!(result, serde_json::json!({"ok": true}));
    }

    #[test]
    fn invoke_builtin_on_unknown_skill_fails() {
        let registry = SkillRegistry::new();
        let err = registry.invoke_builtin("ghost", "run", Value::Null).unwrap_err();
        assert!(matches!(err, KernelError::UnknownSkill(_)));
    }

    #[tokio::test]
    async fn null_loader_discovers_nothing() {
        let loader = NullSkillLoader;
        assert!(loader.discover().await.unwrap().is_empty());
        assert!(loader.reload("anything").await.unwrap().is_none());
    }
}
