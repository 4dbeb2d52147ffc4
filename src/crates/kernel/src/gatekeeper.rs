//! The permission gatekeeper: a pure policy function over skill manifests.
//! Never performs I/O — the manifest registry is supplied by the caller.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::GatekeeperError;

/// A loaded skill's advertised identity and grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillManifest {
    pub name: String,
    pub description: String,
    pub commands: Vec<String>,
    /// Fully-qualified `<skill>.<command>` tool identifiers this skill may call.
    pub permissions: Vec<String>,
}

/// Structured protocol guidance a caller may splice into human-visible
/// output when the gatekeeper reports the target skill is under load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverloadHint {
    pub stage: String,
    pub suggestion: String,
}

/// Split `<target_skill>.<command>`, rejecting empty parts and tool names with no dot.
fn split_tool_name(tool_name: &str) -> std::result::Result<(&str, &str), GatekeeperError> {
    match tool_name.split_once('.') {
        Some((skill, command)) if !skill.is_empty() && !command.is_empty() => Ok((skill, command)),
        _ => Err(GatekeeperError::InvalidToolName(tool_name.to_string())),
    }
}

/// Resolve whether `caller` may invoke `tool_name`.
///
/// - `caller = None` means root/user: always granted.
/// - Otherwise `caller` must resolve via `registry` or the call fails
///   `IdentityVerificationFailed`; the resolved manifest's `permissions`
///   must contain `tool_name` exactly or the call fails `PermissionDenied`.
///
/// On success, returns `Some(OverloadHint)` when `target_under_load` is set,
/// else `None`.
pub fn validate_or_raise(
    caller: Option<&str>,
    tool_name: &str,
    registry: &HashMap<String, SkillManifest>,
    target_under_load: bool,
) -> std::result::Result<Option<OverloadHint>, GatekeeperError> {
    let (target_skill, _command) = split_tool_name(tool_name)?;

    if let Some(caller_name) = caller {
        let manifest = registry
            .get(caller_name)
            .ok_or_else(|| GatekeeperError::IdentityVerificationFailed(caller_name.to_string()))?;

        if !manifest.permissions.iter().any(|granted| granted == tool_name) {
            return Err(GatekeeperError::PermissionDenied { required: tool_name.to_string() });
        }
    }

    Ok(overload_hint(target_under_load, target_skill))
}

fn overload_hint(target_under_load: bool, target_skill: &str) -> Option<OverloadHint> {
    if !target_under_load {
        return None;
    }
    Some(OverloadHint {
        stage: target_skill.to_string(),
        suggestion: format!("'{target_skill}' is under load; consider retrying or batching requests"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(caller: &str, permissions: &[&str]) -> HashMap<String, SkillManifest> {
        let mut registry = HashMap::new();
        registry.insert(
            caller.to_string(),
            SkillManifest {
                name: caller.to_string(),
                description: String::new(),
                commands: Vec::new(),
                permissions: permissions.iter().map(|p| p.to_string()).collect(),
            },
        );
        registry
    }

    #[test]
    fn malformed_tool_name_is_rejected() {
        let err = validate_or_raise(None, "no_dot_here", &HashMap::new(), false).unwrap_err();
        assert!(matches!(err, GatekeeperError::InvalidToolName(_)));
    }

    #[test]
    fn root_caller_is_always_granted() {
        let result = validate_or_raise(None, "notes.search", &HashMap::new(), false).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn unknown_caller_fails_identity_verification() {
        let err = validate_or_raise(Some("ghost"), "notes.search", &HashMap::new(), false).unwrap_err();
        assert!(matches!(err, GatekeeperError::IdentityVerificationFailed(_)));
    }

    #[test]
    fn caller_without_grant_is_denied() {
        let registry = registry_with("scribe", &["scribe.write"]);
        let err = validate_or_raise(Some("scribe"), "notes.search", &registry, false).unwrap_err();
        assert!(matches!(err, GatekeeperError::PermissionDenied { required } if required == "notes.search"));
    }

    #[test]
    fn caller_with_grant_is_allowed() {
        let registry = registry_with("scribe", &["notes.search"]);
        let result = validate_or_raise(Some("scribe"), "notes.search", &registry, false).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn overload_hint_surfaces_only_when_target_is_under_load() {
        let registry = registry_with("scribe", &["notes.search"]);
        let result = validate_or_raise(Some("scribe"), "notes.search", &registry, true).unwrap();
        assert_eq!(
            result,
            Some(OverloadHint {
                stage: "notes".to_string(),
                suggestion: "'notes' is under load; consider retrying or batching requests".to_string(),
            })
        );
    }

    #[test]
    fn permission_check_is_pure_and_repeatable() {
        let registry = registry_with("scribe", &["notes.search"]);
        let first = validate_or_raise(Some("scribe"), "notes.search", &registry, false);
        let second = validate_or_raise(Some("scribe"), "notes.search", &registry, false);
        assert_eq!(first.is_ok(), second.is_ok());
    }
}
