//! Cross-checks between manifest hooks and the primary implementation module.
//!
//! Purely textual: the module is never executed or parsed into a syntax
//! tree, so unconventional code styles (e.g. hooks registered through a
//! helper, or a class exported separately from its declaration) produce
//! false positives.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::diagnostics::{Category, Finding, C001, C002, C003, C004, IO01};
use crate::layout::PluginLayout;
use crate::manifest::PluginManifest;

static DEFAULT_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"export\s+default\s+class").expect("default class regex"));

/// Matches both `async init()` and `init()`.
static INIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:async\s+)?init\s*\(\s*\)").expect("init regex"));

static HOOKS_RETURN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"return\s*\{\s*HOOKS\s*:").expect("hooks return regex"));

/// Check the primary module's export contract and hook coverage.
///
/// Missing modules are left to the structural check; unreadable ones are
/// reported as a scan warning.
#[must_use]
pub fn check_consistency(
    dir: &Path,
    manifest: Option<&PluginManifest>,
    layout: &PluginLayout,
) -> Vec<Finding> {
    let module = layout.primary_module.as_str();
    let path = layout.primary_module_path(dir);
    if !path.exists() {
        return Vec::new();
    }
    match std::fs::read_to_string(&path) {
        Ok(source) => {
            let hooks = manifest.map(|m| m.hooks.as_slice()).unwrap_or_default();
            check_module_source(&source, hooks, layout)
        }
        Err(e) => vec![Finding::warning(
            Category::ScanIo,
            IO01,
            format!("Failed to validate {module}: {e}"),
        )
        .with_file(module)],
    }
}

/// Check module source text against the declared hooks.
///
/// - C001: no `export default class`
/// - C002: no `init()` entry point
/// - C003: `init` does not return `{ HOOKS: ... }`
/// - C004: one per declared hook with no `hook:` handler key
#[must_use]
pub fn check_module_source(
    source: &str,
    hooks: &[String],
    layout: &PluginLayout,
) -> Vec<Finding> {
    let module = layout.primary_module.as_str();
    let manifest = layout.manifest.as_str();
    let mut findings = Vec::new();
    let issue = |code: &'static str, msg: String| {
        Finding::issue(Category::Consistency, code, msg).with_file(module)
    };

    if !DEFAULT_CLASS_RE.is_match(source) {
        findings.push(issue(C001, format!("{module} must export a default class")));
    }
    if !INIT_RE.is_match(source) {
        findings.push(issue(C002, "Plugin class must have an init method".to_string()));
    }
    if !HOOKS_RETURN_RE.is_match(source) {
        findings.push(issue(
            C003,
            "init method must return an object with HOOKS".to_string(),
        ));
    }

    for hook in hooks {
        if !has_handler(source, hook) {
            findings.push(issue(
                C004,
                format!("Hook '{hook}' declared in {manifest} but not implemented in {module}"),
            ));
        }
    }

    findings
}

/// Returns `true` if `hook` appears as an object key (`hook:` or `'hook':`)
/// in the source, not as the tail of a longer identifier.
fn has_handler(source: &str, hook: &str) -> bool {
    let pattern = format!(r#"(?:^|[^\w$]){}['"]?\s*:"#, regex::escape(hook));
    Regex::new(&pattern).is_ok_and(|re| re.is_match(source))
}
