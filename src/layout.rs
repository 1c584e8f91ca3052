//! File layout contract shared with the plugin scaffolding generator.

use std::path::{Path, PathBuf};

/// Names of the well-known files inside a plugin directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginLayout {
    /// Manifest document (required).
    pub manifest: String,
    /// Primary implementation module (required).
    pub primary_module: String,
    /// Routing module (required iff the manifest declares routes).
    pub routing_module: String,
    /// Human-readable description document (recommended).
    pub description_doc: String,
    /// Dependency manifest (optional).
    pub dependency_manifest: String,
}

impl Default for PluginLayout {
    fn default() -> Self {
        Self {
            manifest: "settings.json".to_string(),
            primary_module: "index.js".to_string(),
            routing_module: "routes.js".to_string(),
            description_doc: "README.md".to_string(),
            dependency_manifest: "package.json".to_string(),
        }
    }
}

impl PluginLayout {
    /// Files that must exist in every plugin.
    #[must_use]
    pub fn required_files(&self) -> [&str; 2] {
        [&self.manifest, &self.primary_module]
    }

    /// Files whose absence only warrants a warning.
    #[must_use]
    pub fn recommended_files(&self) -> [&str; 1] {
        [&self.description_doc]
    }

    #[must_use]
    pub fn manifest_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.manifest)
    }

    #[must_use]
    pub fn primary_module_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.primary_module)
    }

    #[must_use]
    pub fn dependency_manifest_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.dependency_manifest)
    }
}
