//! The Cortex: a lexical semantic index over loaded skills.
//!
//! Grounded in the teacher's `orca::router::Router` trait shape (a pluggable
//! strategy whose `route()` returns a decision) but re-purposed: instead of
//! sequencing workflow tasks, it resolves a free-text or tool-name query to
//! the best-matching loaded skill. Scoring reuses `link_graph::text_index`'s
//! BM25-lite tokenizer and document-frequency model rather than a heavyweight
//! embedding dependency, since no such crate sits in the corpus for this
//! subsystem — a lexical index over each skill's name/description/commands
//! is the "semantic" index the specification names.

use std::collections::HashMap;
use std::sync::RwLock;

use link_graph::text_index::{bm25_score, tokenize, DocFrequencies};

use crate::gatekeeper::SkillManifest;

#[derive(Debug, Clone, PartialEq)]
pub struct CortexMatch {
    pub skill_name: String,
    pub score: f64,
}

struct IndexedSkill {
    name: String,
    tokens: Vec<String>,
}

/// The skill-matching semantic index. Cheap to rebuild incrementally: each
/// `index_skill`/`remove_skill` call only touches that skill's entry and
/// recomputes the shared document-frequency table over the remainder.
pub struct Cortex {
    entries: RwLock<Vec<IndexedSkill>>,
}

impl Cortex {
    pub fn new() -> Self {
        Self { entries: RwLock::new(Vec::new()) }
    }

    /// Build a fully-populated index from every currently loaded skill.
    /// Used once at boot (step 3), run off the hot boot path.
    pub fn rebuild(&self, manifests: &[SkillManifest]) {
        let entries = manifests.iter().map(indexed_skill).collect();
        *self.entries.write().unwrap() = entries;
    }

    /// Incrementally add or update one skill's entry, called by the reactor's
    /// `file/changed`/`file/created` handler after a hot-reload.
    pub fn index_skill(&self, manifest: &SkillManifest) {
        let mut entries = self.entries.write().unwrap();
        entries.retain(|e| e.name != manifest.name);
        entries.push(indexed_skill(manifest));
    }

    pub fn remove_skill(&self, name: &str) {
        self.entries.write().unwrap().retain(|e| e.name != name);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    /// Resolve `query` (free text, or a `skill.command`-shaped tool name) to
    /// the best-scoring loaded skill, or `None` if the index is empty or
    /// nothing scores above zero.
    pub fn route(&self, query: &str) -> Option<CortexMatch> {
        let entries = self.entries.read().unwrap();
        if entries.is_empty() {
            return None;
        }

        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return None;
        }

        let stats = DocFrequencies::build(entries.iter().map(|e| e.tokens.as_slice()));

        entries
            .iter()
            .map(|e| CortexMatch {
                skill_name: e.name.clone(),
                score: bm25_score(&query_tokens, &e.tokens, &stats),
            })
            .filter(|m| m.score > 0.0)
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
    }
}

impl Default for Cortex {
    fn default() -> Self {
        Self::new()
    }
}

fn indexed_skill(manifest: &SkillManifest) -> IndexedSkill {
    let mut text = format!("{} {}", manifest.name, manifest.description);
    for command in &manifest.commands {
        text.push(' ');
        text.push_str(command);
    }
    IndexedSkill { name: manifest.name.clone(), tokens: tokenize(&text) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(name: &str, description: &str, commands: &[&str]) -> SkillManifest {
        SkillManifest {
            name: name.to_string(),
            description: description.to_string(),
            commands: commands.iter().map(|c| c.to_string()).collect(),
            permissions: Vec::new(),
        }
    }

    #[test]
    fn empty_index_routes_nothing() {
        let cortex = Cortex::new();
        assert!(cortex.route("search notes").is_none());
    }

    #[test]
    fn routes_to_the_best_lexical_match() {
        let cortex = Cortex::new();
        cortex.rebuild(&[
            manifest("notes", "search and browse the link graph", &["search", "neighbors"]),
            manifest("weather", "fetch the current forecast", &["forecast"]),
        ]);

        let hit = cortex.route("search the graph for notes").unwrap();
        assert_eq!(hit.skill_name, "notes");
    }

    #[test]
    fn index_skill_is_incremental() {
        let cortex = Cortex::new();
        cortex.index_skill(&manifest("notes", "search the link graph", &["search"]));
        assert_eq!(cortex.len(), 1);
        cortex.index_skill(&manifest("notes", "search the link graph, updated", &["search"]));
        assert_eq!(cortex.len(), 1);
        cortex.remove_skill("notes");
        assert!(cortex.is_empty());
    }

    #[test]
    fn unmatched_query_returns_none() {
        let cortex = Cortex::new();
        cortex.rebuild(&[manifest("weather", "fetch the forecast", &["forecast"])]);
        assert!(cortex.route("xyzabc123").is_none());
    }
}
