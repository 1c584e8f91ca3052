//! Per-plugin validation pipeline.
//!
//! Runs the manifest, structure, security, consistency, and dependency
//! passes independently and aggregates their findings into a report. No
//! pass can abort another; the only hard failure is a missing plugin
//! directory.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::consistency::check_consistency;
use crate::dependencies::audit_dependencies;
use crate::errors::{PlugcheckError, Result};
use crate::layout::PluginLayout;
use crate::manifest::{check_manifest, read_manifest, PluginManifest};
use crate::report::ValidationReport;
use crate::rules::RuleSet;
use crate::scanner::scan_plugin;
use crate::structure::check_structure;

/// Validation engine configured with an immutable rule set and layout.
#[derive(Debug, Default)]
pub struct Validator {
    rules: RuleSet,
    layout: PluginLayout,
}

impl Validator {
    #[must_use]
    pub fn new(rules: RuleSet, layout: PluginLayout) -> Self {
        Self { rules, layout }
    }

    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    #[must_use]
    pub fn layout(&self) -> &PluginLayout {
        &self.layout
    }

    /// Validate a plugin directory, using its directory name as the plugin id.
    pub fn validate_path(&self, dir: &Path) -> Result<ValidationReport> {
        let id = plugin_id_from_path(dir);
        self.validate(&id, dir)
    }

    /// Validate the plugin at `dir` under the given id.
    ///
    /// Fails only with [`PlugcheckError::PluginNotFound`]; everything else
    /// found inside the plugin is reported as findings.
    pub fn validate(&self, plugin_id: &str, dir: &Path) -> Result<ValidationReport> {
        if !dir.is_dir() {
            return Err(PlugcheckError::PluginNotFound {
                path: dir.to_path_buf(),
            });
        }
        info!(plugin = plugin_id, path = %dir.display(), "validating plugin");

        let mut findings = Vec::new();

        debug!(plugin = plugin_id, "checking manifest");
        let manifest = match read_manifest(&self.layout.manifest_path(dir)) {
            Ok(Some(raw)) => {
                findings.extend(check_manifest(&raw, plugin_id, &self.layout, &self.rules));
                Some(PluginManifest::from_raw(&raw))
            }
            Ok(None) => None,
            Err(finding) => {
                findings.push(finding);
                None
            }
        };

        debug!(plugin = plugin_id, "checking structure");
        findings.extend(check_structure(dir, manifest.as_ref(), &self.layout));

        debug!(plugin = plugin_id, "scanning for dangerous patterns");
        findings.extend(scan_plugin(dir, &self.layout, &self.rules));

        debug!(plugin = plugin_id, "checking hook consistency");
        findings.extend(check_consistency(dir, manifest.as_ref(), &self.layout));

        debug!(plugin = plugin_id, "auditing dependencies");
        findings.extend(audit_dependencies(dir, &self.layout, &self.rules));

        let report = ValidationReport::new(plugin_id, dir.to_path_buf(), findings);
        info!(
            plugin = plugin_id,
            verdict = ?report.verdict(),
            issues = report.issues().count(),
            warnings = report.warnings().count(),
            "validation finished"
        );
        Ok(report)
    }
}

/// Plugin id implied by a directory path: its final component.
#[must_use]
pub fn plugin_id_from_path(dir: &Path) -> String {
    if let Some(name) = dir.file_name() {
        return name.to_string_lossy().to_string();
    }
    // `.` and `..` have no final component until resolved.
    dir.canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|s| s.to_string_lossy().to_string()))
        .unwrap_or_default()
}

/// Directory of the plugin registered under `plugin_id`.
///
/// The id must be a single directory name so the result stays inside
/// `plugins_dir`.
pub fn resolve_plugin_dir(plugins_dir: &Path, plugin_id: &str) -> Result<PathBuf> {
    let invalid = plugin_id.is_empty()
        || plugin_id == "."
        || plugin_id == ".."
        || plugin_id.contains(['/', '\\'])
        || Path::new(plugin_id).is_absolute();
    if invalid {
        return Err(PlugcheckError::InvalidPluginId {
            id: plugin_id.to_string(),
        });
    }
    Ok(plugins_dir.join(plugin_id))
}
