//! Configuration resolution: explicit constructor arg > environment variable
//! > settings-file entry > built-in default, per field.
//!
//! Mirrors the shape of `tooling::config::ConfigBuilder` (validate / merge /
//! layered resolution) without implementing the trait directly, since this
//! crate's error type lives at a different error-taxonomy boundary than
//! `tooling::Result`.

use std::collections::HashSet;
use std::path::PathBuf;

use tooling::config::{get_env_or, get_env_parse};

use crate::error::{BackendError, Result};

/// Directories excluded from every scan regardless of caller configuration.
/// Callers may extend this set but never shrink it.
pub const BASELINE_EXCLUDE: &[&str] = &[".git", ".cache", ".devenv", ".run", ".venv"];

const ENV_CACHE_URL: &str = "LINK_GRAPH_CACHE_URL";
const ENV_CACHE_KEY_PREFIX: &str = "LINK_GRAPH_CACHE_KEY_PREFIX";
const ENV_CACHE_TTL_SECONDS: &str = "LINK_GRAPH_CACHE_TTL_SECONDS";
const ENV_NOTEBOOK_ROOT: &str = "LINK_GRAPH_NOTEBOOK_ROOT";
const ENV_INCLUDE_DIRS: &str = "LINK_GRAPH_INCLUDE_DIRS";
const ENV_INCLUDE_AUTO: &str = "LINK_GRAPH_INCLUDE_AUTO";
const ENV_EXCLUDE_DIRS: &str = "LINK_GRAPH_EXCLUDE_DIRS";

const DEFAULT_CACHE_KEY_PREFIX: &str = "link_graph";
const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;

/// Explicit overrides a caller may supply; `None` falls through to env, then
/// settings-file (not modeled here — no settings-file format exists in this
/// corpus's dependency set, so the chain is explicit > env > default), then
/// the built-in default.
#[derive(Debug, Clone, Default)]
pub struct BackendConfigOverrides {
    pub notebook_root: Option<PathBuf>,
    pub include_dirs: Option<Vec<String>>,
    pub include_auto: Option<bool>,
    pub include_candidates: Option<Vec<String>>,
    pub exclude_dirs: Option<Vec<String>>,
    pub cache_url: Option<String>,
    pub cache_key_prefix: Option<String>,
    pub cache_ttl_seconds: Option<u64>,
}

/// Fully-resolved backend configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub notebook_root: PathBuf,
    pub include_dirs: Option<Vec<String>>,
    pub exclude_dirs: HashSet<String>,
    pub cache_url: Option<String>,
    pub cache_key_prefix: String,
    pub cache_ttl_seconds: u64,
}

impl BackendConfig {
    pub fn resolve(overrides: BackendConfigOverrides) -> Result<Self> {
        let notebook_root = overrides
            .notebook_root
            .or_else(|| get_env_or(ENV_NOTEBOOK_ROOT, "").ok().filter(|s| !s.is_empty()).map(PathBuf::from))
            .ok_or_else(|| BackendError::InvalidOption("notebook_root is required".to_string()))?;

        if !notebook_root.exists() {
            return Err(BackendError::NotebookRootMissing(notebook_root.display().to_string()));
        }

        let include_dirs = resolve_include_dirs(&overrides, &notebook_root);

        let mut exclude_dirs: HashSet<String> = BASELINE_EXCLUDE.iter().map(|s| s.to_lowercase()).collect();
        let extra_exclude = overrides.exclude_dirs.clone().unwrap_or_else(|| {
            get_env_or(ENV_EXCLUDE_DIRS, "")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });
        exclude_dirs.extend(extra_exclude.into_iter().map(|s| normalize_dir_name(&s)));

        let cache_url = overrides.cache_url.or_else(|| get_env_or(ENV_CACHE_URL, "").ok().filter(|s| !s.is_empty()));
        let cache_key_prefix = overrides
            .cache_key_prefix
            .or_else(|| get_env_or(ENV_CACHE_KEY_PREFIX, "").ok().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| DEFAULT_CACHE_KEY_PREFIX.to_string());
        let cache_ttl_seconds = overrides
            .cache_ttl_seconds
            .or_else(|| get_env_parse(ENV_CACHE_TTL_SECONDS).ok().flatten())
            .unwrap_or(DEFAULT_CACHE_TTL_SECONDS);

        Ok(Self {
            notebook_root,
            include_dirs,
            exclude_dirs,
            cache_url,
            cache_key_prefix,
            cache_ttl_seconds,
        })
    }

    /// A deterministic partition key for the persistent stats cache, stable
    /// across process restarts for an otherwise-unchanged configuration.
    pub fn cache_source_key(&self) -> String {
        let mut include: Vec<String> = self.include_dirs.clone().unwrap_or_default();
        include.sort();
        let include = include.iter().map(|s| s.to_lowercase()).collect::<Vec<_>>().join(",");

        let mut exclude: Vec<String> = self.exclude_dirs.iter().cloned().collect();
        exclude.sort();
        let exclude = exclude.join(",");

        format!(
            "{} | include={} | exclude={}",
            self.notebook_root.display(),
            include,
            exclude
        )
    }
}

/// Lower-cases and ensures exactly one leading dot, so `"Git"`, `".git"`,
/// and `"git"` all collapse to the same excluded-directory name.
fn normalize_dir_name(raw: &str) -> String {
    let stripped = raw.trim().trim_start_matches('.').to_lowercase();
    format!(".{}", stripped)
}

fn resolve_include_dirs(overrides: &BackendConfigOverrides, notebook_root: &std::path::Path) -> Option<Vec<String>> {
    if let Some(explicit) = &overrides.include_dirs {
        return Some(explicit.clone());
    }
    if let Ok(Some(env_dirs)) = get_env_or(ENV_INCLUDE_DIRS, "").map(|s| if s.is_empty() { None } else { Some(s) }) {
        return Some(env_dirs.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect());
    }

    let auto = overrides
        .include_auto
        .or_else(|| get_env_parse::<bool>(ENV_INCLUDE_AUTO).ok().flatten())
        .unwrap_or(false);
    if !auto {
        return None;
    }

    let candidates = overrides.include_candidates.clone().unwrap_or_default();
    let kept: Vec<String> = candidates.into_iter().filter(|c| notebook_root.join(c).exists()).collect();
    if kept.is_empty() {
        None
    } else {
        Some(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_notebook_root_is_invalid_option() {
        let result = BackendConfig::resolve(BackendConfigOverrides::default());
        assert!(matches!(result, Err(BackendError::InvalidOption(_))));
    }

    #[test]
    fn nonexistent_explicit_root_is_notebook_root_missing() {
        let overrides = BackendConfigOverrides {
            notebook_root: Some(PathBuf::from("/definitely/not/a/real/path/xyz")),
            ..Default::default()
        };
        let result = BackendConfig::resolve(overrides);
        assert!(matches!(result, Err(BackendError::NotebookRootMissing(_))));
    }

    #[test]
    fn baseline_exclusions_always_present() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = BackendConfigOverrides {
            notebook_root: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let config = BackendConfig::resolve(overrides).unwrap();
        for baseline in BASELINE_EXCLUDE {
            assert!(config.exclude_dirs.contains(*baseline));
        }
    }

    #[test]
    fn cache_source_key_is_deterministic_regardless_of_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let overrides_a = BackendConfigOverrides {
            notebook_root: Some(dir.path().to_path_buf()),
            exclude_dirs: Some(vec!["B".to_string(), "a".to_string()]),
            ..Default::default()
        };
        let overrides_b = BackendConfigOverrides {
            notebook_root: Some(dir.path().to_path_buf()),
            exclude_dirs: Some(vec!["a".to_string(), "B".to_string()]),
            ..Default::default()
        };
        let a = BackendConfig::resolve(overrides_a).unwrap();
        let b = BackendConfig::resolve(overrides_b).unwrap();
        assert_eq!(a.cache_source_key(), b.cache_source_key());
    }

    #[test]
    fn include_auto_keeps_only_existing_candidates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("real")).unwrap();
        let overrides = BackendConfigOverrides {
            notebook_root: Some(dir.path().to_path_buf()),
            include_auto: Some(true),
            include_candidates: Some(vec!["real".to_string(), "ghost".to_string()]),
            ..Default::default()
        };
        let config = BackendConfig::resolve(overrides).unwrap();
        assert_eq!(config.include_dirs, Some(vec!["real".to_string()]));
    }
}
