//! Directory structure checks for plugin packages.
//!
//! Runs independently of the manifest schema check: a malformed manifest
//! never hides a missing file, and a missing file never hides a manifest
//! problem.

use std::path::Path;

use crate::diagnostics::{Category, Finding, L001, L002, L003};
use crate::layout::PluginLayout;
use crate::manifest::PluginManifest;

/// Validate the directory structure of a plugin package.
///
/// Checks:
/// - L001: required files (manifest, primary module) exist
/// - L002: recommended files (description document) exist
/// - L003: a routing module exists when the manifest declares routes
///
/// `manifest` is `None` when the manifest is missing or unparseable; the
/// route check is skipped in that case.
#[must_use]
pub fn check_structure(
    dir: &Path,
    manifest: Option<&PluginManifest>,
    layout: &PluginLayout,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    for file in layout.required_files() {
        if !dir.join(file).exists() {
            findings.push(
                Finding::issue(
                    Category::Structural,
                    L001,
                    format!("Missing required file: {file}"),
                )
                .with_file(file),
            );
        }
    }

    for file in layout.recommended_files() {
        if !dir.join(file).exists() {
            findings.push(
                Finding::warning(
                    Category::Structural,
                    L002,
                    format!("Missing recommended file: {file}"),
                )
                .with_file(file),
            );
        }
    }

    let routing = layout.routing_module.as_str();
    if manifest.is_some_and(|m| !m.routes.is_empty()) && !dir.join(routing).exists() {
        findings.push(
            Finding::issue(
                Category::Structural,
                L003,
                format!("Plugin defines routes but {routing} is missing"),
            )
            .with_file(routing),
        );
    }

    findings
}
