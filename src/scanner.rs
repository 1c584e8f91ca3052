//! Security pattern scanner for plugin implementation modules.
//!
//! Pattern based, not semantic: false positives are expected and mitigated
//! by the safe-pattern allowlist, and false negatives are accepted.
//!
//! Reporting granularity is one issue per (file, category). Scanning a
//! category in a file stops at its first unsuppressed match, so several
//! distinct dangerous calls of the same category in one file surface as a
//! single finding.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::dependencies::load_dependencies;
use crate::diagnostics::{Category, Finding, IO01, S001, S002};
use crate::layout::PluginLayout;
use crate::rules::RuleSet;

/// Directories never descended into.
const SKIPPED_DIRS: &[&str] = &["node_modules", ".git"];

/// Scan every implementation module and the dependency manifest.
#[must_use]
pub fn scan_plugin(dir: &Path, layout: &PluginLayout, rules: &RuleSet) -> Vec<Finding> {
    let (modules, mut findings) = collect_modules(dir, rules);
    for (path, relative) in modules {
        match std::fs::read_to_string(&path) {
            Ok(content) => findings.extend(scan_source(&content, &relative, rules)),
            Err(e) => findings.push(scan_failure(relative, &e)),
        }
    }
    findings.extend(check_dangerous_packages(dir, layout, rules));
    findings
}

/// Scan one source text, attributing findings to `relative`.
///
/// Emits at most one issue per danger category.
#[must_use]
pub fn scan_source(content: &str, relative: &str, rules: &RuleSet) -> Vec<Finding> {
    let mut findings = Vec::new();
    for category in rules.categories() {
        'patterns: for pattern in &category.patterns {
            for m in pattern.matches(content) {
                if rules.is_suppressed(content, &m) {
                    debug!(file = relative, pattern = pattern.as_str(), "match suppressed by safe pattern");
                    continue;
                }
                debug!(file = relative, category = %category.name, matched = m.as_str(), "danger pattern matched");
                findings.push(
                    Finding::issue(
                        Category::Security,
                        S001,
                        format!("Security issue: {} detected in {relative}", category.name),
                    )
                    .with_file(relative),
                );
                break 'patterns;
            }
        }
    }
    findings
}

/// Check the dependency manifest against the dangerous-package list.
///
/// A malformed manifest is left to the dependency audit.
#[must_use]
pub fn check_dangerous_packages(
    dir: &Path,
    layout: &PluginLayout,
    rules: &RuleSet,
) -> Vec<Finding> {
    let Some(Ok(manifest)) = load_dependencies(dir, layout) else {
        return Vec::new();
    };
    let suspicious: Vec<&str> = manifest
        .all_names()
        .into_iter()
        .filter(|name| rules.is_dangerous_package(name))
        .collect();
    if suspicious.is_empty() {
        return Vec::new();
    }
    vec![Finding::issue(
        Category::Security,
        S002,
        format!("Suspicious dependencies found: {}", suspicious.join(", ")),
    )
    .with_file(layout.dependency_manifest.as_str())]
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && SKIPPED_DIRS
            .iter()
            .any(|d| entry.file_name().to_str() == Some(*d))
}

/// Collect implementation modules as `(absolute, relative)` pairs in sorted order.
///
/// Entries the walk cannot read are returned as `IO01` warnings.
fn collect_modules(dir: &Path, rules: &RuleSet) -> (Vec<(PathBuf, String)>, Vec<Finding>) {
    let mut modules = Vec::new();
    let mut failures = Vec::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let relative = e
                    .path()
                    .map_or_else(|| ".".to_string(), |p| relative_to(dir, p));
                failures.push(scan_failure(relative, &e));
                continue;
            }
        };
        let is_module = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| rules.is_scanned_extension(ext));
        if is_module {
            modules.push((entry.path().to_path_buf(), relative_to(dir, entry.path())));
        }
    }
    (modules, failures)
}

fn relative_to(dir: &Path, path: &Path) -> String {
    path.strip_prefix(dir)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn scan_failure(relative: String, err: &dyn std::fmt::Display) -> Finding {
    Finding::warning(
        Category::ScanIo,
        IO01,
        format!("Failed to scan {relative} for security issues: {err}"),
    )
    .with_file(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn scan(content: &str) -> Vec<Finding> {
        scan_source(content, "index.js", &RuleSet::default())
    }

    #[test]
    fn clean_source_has_no_findings() {
        let src = "export default class P {\n  async init() { return { HOOKS: {} }; }\n}\n";
        assert!(scan(src).is_empty());
    }

    #[test]
    fn eval_is_code_execution() {
        let findings = scan("const r = eval(input);\n");
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("arbitrary_code_execution"));
        assert!(findings[0].message.contains("index.js"));
    }

    #[test]
    fn string_timer_is_code_execution() {
        let findings = scan("setTimeout(\"doWork()\", 100);\n");
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("arbitrary_code_execution"));
        assert!(scan("setTimeout(() => doWork(), 100);\n").is_empty());
    }

    #[test]
    fn one_issue_per_category() {
        let src = "exec(a);\nexecSync(b);\nspawn(c);\nimport cp from 'child_process';\n";
        let findings = scan(src);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("command_execution"));
    }

    #[test]
    fn distinct_categories_reported_separately() {
        let src = "eval(x);\nfs.writeFileSync(p, d);\naxios.get(url);\n";
        let findings = scan(src);
        let names: Vec<_> = findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(findings.len(), 3, "{names:?}");
        assert!(names[0].contains("arbitrary_code_execution"));
        assert!(names[1].contains("file_system_access"));
        assert!(names[2].contains("network_access"));
    }

    #[test]
    fn logged_exec_is_allowlisted() {
        let src = "logger.info(\"about to exec(command)\");\n";
        assert!(scan(src).is_empty());
        let src = "console.log('retry exec(' + n + ')');\n";
        assert!(scan(src).is_empty());
    }

    #[test]
    fn removing_log_wrapper_reports_match() {
        let src = "const s = \"about to exec(command)\";\n";
        let findings = scan(src);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("command_execution"));
    }

    #[test]
    fn leading_log_call_does_not_hide_same_line_calls() {
        let src = "console.log('start'); eval(userInput); require('child_process').exec(cmd);\n";
        let findings = scan(src);
        assert_eq!(findings.len(), 2);
        assert!(findings[0].message.contains("arbitrary_code_execution"));
        assert!(findings[1].message.contains("command_execution"));
    }

    #[test]
    fn minified_module_is_scanned() {
        let src = "console.log('boot');export default class P{async init(){eval(atob(x));require('child_process').execSync('rm -rf /');return{HOOKS:{}}}}";
        let findings = scan(src);
        assert_eq!(findings.len(), 2, "{findings:?}");
    }

    #[test]
    fn suppressed_match_does_not_hide_later_match() {
        let src = "logger.debug('exec(x)');\nexec(realCommand);\n";
        assert_eq!(scan(src).len(), 1);
    }

    #[test]
    fn package_json_read_is_not_file_access() {
        assert!(scan("const pkg = fs.readFileSync(\"package.json\");\n").is_empty());
    }

    #[test]
    fn path_traversal_is_file_access() {
        let findings = scan("const p = path.resolve(base, '../../etc');\n");
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("file_system_access"));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_is_scan_warning() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let lib = dir.path().join("lib");
        fs::create_dir(&lib).unwrap();
        fs::write(lib.join("evil.js"), "eval(x);\n").unwrap();
        fs::set_permissions(&lib, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&lib).is_ok() {
            // Permissions are not enforced for this user (e.g. root).
            fs::set_permissions(&lib, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let findings = scan_plugin(dir.path(), &PluginLayout::default(), &RuleSet::default());
        fs::set_permissions(&lib, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(findings.len(), 1, "{findings:?}");
        assert_eq!(findings[0].code, IO01);
        assert_eq!(findings[0].category, Category::ScanIo);
        assert!(findings[0].is_warning());
        assert_eq!(findings[0].file.as_deref(), Some("lib"));
        assert!(findings[0].message.starts_with("Failed to scan lib"));
    }

    #[test]
    fn scan_plugin_walks_nested_modules_in_order() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("index.js"), "eval(x);\n").unwrap();
        fs::write(dir.path().join("lib/net.ts"), "http.get(url);\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "eval(x);\n").unwrap();
        let findings = scan_plugin(dir.path(), &PluginLayout::default(), &RuleSet::default());
        let files: Vec<_> = findings.iter().map(|f| f.file.as_deref().unwrap()).collect();
        assert_eq!(files, vec!["index.js", "lib/net.ts"]);
    }

    #[test]
    fn node_modules_are_skipped() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "eval(x);\n").unwrap();
        let findings = scan_plugin(dir.path(), &PluginLayout::default(), &RuleSet::default());
        assert!(findings.is_empty());
    }

    #[test]
    fn undecodable_file_is_warning_and_scan_continues() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.js"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
        fs::write(dir.path().join("b.js"), "eval(x);\n").unwrap();
        let findings = scan_plugin(dir.path(), &PluginLayout::default(), &RuleSet::default());
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].category, Category::ScanIo);
        assert!(findings[0].is_warning());
        assert_eq!(findings[1].category, Category::Security);
    }

    #[test]
    fn dangerous_packages_listed_in_one_issue() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{ "dependencies": { "vm2": "3", "pg": "8" }, "devDependencies": { "shelljs": "0.8" } }"#,
        )
        .unwrap();
        let findings =
            check_dangerous_packages(dir.path(), &PluginLayout::default(), &RuleSet::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, S002);
        assert_eq!(findings[0].message, "Suspicious dependencies found: shelljs, vm2");
    }

    #[test]
    fn malformed_package_json_left_to_audit() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("package.json"), "{").unwrap();
        let findings =
            check_dangerous_packages(dir.path(), &PluginLayout::default(), &RuleSet::default());
        assert!(findings.is_empty());
    }
}
