//! Dependency manifest (`package.json`) model and audit.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::diagnostics::{Category, Finding, D001, D002};
use crate::layout::PluginLayout;
use crate::rules::RuleSet;

/// Declared dependencies of a plugin.
///
/// Any other keys in the document are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct DependencyManifest {
    /// Runtime dependencies: name → version requirement.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    /// Development dependencies: name → version requirement.
    #[serde(default, rename = "devDependencies")]
    pub dev_dependencies: BTreeMap<String, String>,
}

impl DependencyManifest {
    /// All declared package names (runtime and development), sorted, deduplicated.
    #[must_use]
    pub fn all_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .dependencies
            .keys()
            .chain(self.dev_dependencies.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

/// Load the dependency manifest from a plugin directory.
///
/// Returns `None` when the plugin has no dependency manifest, and
/// `Some(Err(message))` when it exists but cannot be read or parsed.
#[must_use]
pub fn load_dependencies(
    dir: &Path,
    layout: &PluginLayout,
) -> Option<std::result::Result<DependencyManifest, String>> {
    let path = layout.dependency_manifest_path(dir);
    if !path.exists() {
        return None;
    }
    let parsed = std::fs::read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|content| {
            serde_json::from_str::<DependencyManifest>(&content).map_err(|e| e.to_string())
        });
    Some(parsed)
}

/// Audit the dependency manifest.
///
/// - D001: malformed manifest (issue)
/// - D002: runtime dependency duplicating a host-provided core package (warning)
#[must_use]
pub fn audit_dependencies(dir: &Path, layout: &PluginLayout, rules: &RuleSet) -> Vec<Finding> {
    let file = layout.dependency_manifest.as_str();
    let manifest = match load_dependencies(dir, layout) {
        None => return Vec::new(),
        Some(Ok(m)) => m,
        Some(Err(e)) => {
            return vec![Finding::issue(
                Category::Dependency,
                D001,
                format!("Invalid {file}: {e}"),
            )
            .with_file(file)];
        }
    };

    manifest
        .dependencies
        .keys()
        .filter(|dep| rules.core_prefix_of(dep).is_some())
        .map(|dep| {
            Finding::warning(
                Category::Dependency,
                D002,
                format!("Plugin should use {dep} from the parent project, not as a direct dependency"),
            )
            .with_file(file)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn audit(content: &str) -> Vec<Finding> {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("package.json"), content).unwrap();
        audit_dependencies(dir.path(), &PluginLayout::default(), &RuleSet::default())
    }

    #[test]
    fn missing_manifest_is_fine() {
        let dir = tempdir().unwrap();
        let findings =
            audit_dependencies(dir.path(), &PluginLayout::default(), &RuleSet::default());
        assert!(findings.is_empty());
    }

    #[test]
    fn invalid_json_is_issue() {
        let findings = audit("{ nope");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, D001);
        assert!(findings[0].is_issue());
    }

    #[test]
    fn non_object_dependencies_is_issue() {
        let findings = audit(r#"{ "dependencies": ["pg"] }"#);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, D001);
    }

    #[test]
    fn core_duplicates_are_warnings() {
        let findings = audit(
            r#"{ "dependencies": { "@composedb/client": "^0.7", "dids": "^5", "pg": "^8" } }"#,
        );
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.code == D002 && f.is_warning()));
        assert!(findings[0].message.contains("@composedb/client"));
    }

    #[test]
    fn dev_dependencies_are_not_audited_for_core_duplicates() {
        let findings = audit(r#"{ "devDependencies": { "@glaze/devtools": "^1" } }"#);
        assert!(findings.is_empty());
    }

    #[test]
    fn all_names_merges_sections() {
        let m: DependencyManifest = serde_json::from_str(
            r#"{ "dependencies": { "b": "1", "a": "1" }, "devDependencies": { "a": "2", "c": "1" } }"#,
        )
        .unwrap();
        assert_eq!(m.all_names(), vec!["a", "b", "c"]);
    }
}
