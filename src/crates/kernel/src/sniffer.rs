//! The Sniffer: a rule-matching path watcher that activates skills when the
//! reactor observes a file under a matching glob.
//!
//! Rules are `(glob_pattern, skill_name)` pairs persisted through the same
//! `serde_json`-envelope convention used across this workspace (the stats
//! cache envelope, context snapshots) and reloaded on boot step 4.

use std::sync::RwLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnifferRule {
    pub glob_pattern: String,
    pub skill_name: String,
}

/// Persists and loads the Sniffer's rule set. The core owns no on-disk
/// format opinion beyond the envelope shape; an embedder supplies the store.
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn load(&self) -> Result<Vec<SnifferRule>>;
    async fn save(&self, rules: &[SnifferRule]) -> Result<()>;
}

/// An in-memory [`RuleStore`], the default and the common test fixture.
#[derive(Default)]
pub struct InMemoryRuleStore {
    rules: RwLock<Vec<SnifferRule>>,
}

impl InMemoryRuleStore {
    pub fn seeded(rules: Vec<SnifferRule>) -> Self {
        Self { rules: RwLock::new(rules) }
    }
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn load(&self) -> Result<Vec<SnifferRule>> {
        Ok(self.rules.read().unwrap().clone())
    }

    async fn save(&self, rules: &[SnifferRule]) -> Result<()> {
        *self.rules.write().unwrap() = rules.to_vec();
        Ok(())
    }
}

/// Compiles `glob_pattern` (`*` and `**` as wildcards, everything else
/// literal) to an anchored regex, the same lightweight approach as the
/// backend's normalized-exclusion-set matching, without pulling in a full
/// glob crate for this single-purpose path test.
fn glob_to_regex(pattern: &str) -> Regex {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push('.'),
            c if "\\.+()|[]{}^$".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    Regex::new(&out).unwrap_or_else(|_| Regex::new("$^").unwrap())
}

/// The Sniffer itself: a compiled rule set, matched against changed paths by
/// the kernel's `file/changed`/`file/created` reactor handler.
pub struct Sniffer {
    rules: RwLock<Vec<(Regex, String)>>,
}

impl Sniffer {
    pub fn new() -> Self {
        Self { rules: RwLock::new(Vec::new()) }
    }

    pub fn load_rules(&self, rules: Vec<SnifferRule>) {
        let compiled = rules.into_iter().map(|r| (glob_to_regex(&r.glob_pattern), r.skill_name)).collect();
        *self.rules.write().unwrap() = compiled;
    }

    pub fn rule_count(&self) -> usize {
        self.rules.read().unwrap().len()
    }

    /// Every skill whose glob matches `path`, in rule-registration order.
    pub fn matches(&self, path: &str) -> Vec<String> {
        self.rules
            .read()
            .unwrap()
            .iter()
            .filter(|(re, _)| re.is_match(path))
            .map(|(_, skill)| skill.clone())
            .collect()
    }
}

impl Default for Sniffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_a_simple_extension_glob() {
        let sniffer = Sniffer::new();
        sniffer.load_rules(vec![SnifferRule {
            glob_pattern: "notes/*.md".to_string(),
            skill_name: "notes".to_string(),
        }]);
        assert_eq!(sniffer.matches("notes/today.md"), vec!["notes".to_string()]);
        assert!(sniffer.matches("notes/sub/today.md").is_empty());
    }

    #[test]
    fn double_star_matches_across_directories() {
        let sniffer = Sniffer::new();
        sniffer.load_rules(vec![SnifferRule {
            glob_pattern: "notes/**/*.md".to_string(),
            skill_name: "notes".to_string(),
        }]);
        assert_eq!(sniffer.matches("notes/a/b/c.md"), vec!["notes".to_string()]);
    }

    #[test]
    fn multiple_rules_can_match_the_same_path() {
        let sniffer = Sniffer::new();
        sniffer.load_rules(vec![
            SnifferRule { glob_pattern: "**/*.md".to_string(), skill_name: "notes".to_string() },
            SnifferRule { glob_pattern: "journal/**".to_string(), skill_name: "journal".to_string() },
        ]);
        let hits = sniffer.matches("journal/2026-07-28.md");
        assert_eq!(hits, vec!["notes".to_string(), "journal".to_string()]);
    }

    #[tokio::test]
    async fn in_memory_rule_store_round_trips() {
        let store = InMemoryRuleStore::default();
        let rules = vec![SnifferRule { glob_pattern: "*.md".to_string(), skill_name: "notes".to_string() }];
        store.save(&rules).await.unwrap();
        assert_eq!(store.load().await.unwrap(), rules);
    }
}
