//! Structured findings produced by the validation passes.
//!
//! Every check converts its own failures into [`Finding`]s carrying a
//! stable code, a category from the error taxonomy, and a severity.
//! Issues block a plugin; warnings are advisory.

use std::fmt;

use serde::Serialize;

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocking problem: the plugin fails validation.
    Issue,
    /// Advisory problem: the plugin may still pass.
    Warning,
}

/// Which check (and which error kind) produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// The manifest could not be read or is not a structured document.
    ManifestParse,
    /// The manifest parsed but does not conform to the field schema.
    ManifestSchema,
    /// A required or recommended file is missing.
    Structural,
    /// A dangerous code pattern or package was detected.
    Security,
    /// Declared hooks and the implementation module disagree.
    Consistency,
    /// The dependency manifest is malformed or bundles host-provided packages.
    Dependency,
    /// A file could not be read while scanning.
    ScanIo,
}

impl Category {
    /// Taxonomy name used in rendered reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::ManifestParse => "ManifestParseError",
            Category::ManifestSchema => "ManifestSchemaError",
            Category::Structural => "StructuralError",
            Category::Security => "SecurityFinding",
            Category::Consistency => "ConsistencyError",
            Category::Dependency => "DependencyError",
            Category::ScanIo => "ScanIOError",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single reported problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// Severity level.
    pub severity: Severity,
    /// Error kind.
    pub category: Category,
    /// Stable code (e.g., `"M002"`, `"S001"`).
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Plugin-relative file the finding refers to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Finding {
    /// Create a new finding with the given severity, category, code, and message.
    #[must_use]
    pub fn new(
        severity: Severity,
        category: Category,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            code,
            message: message.into(),
            file: None,
        }
    }

    /// Shorthand for a blocking finding.
    #[must_use]
    pub fn issue(category: Category, code: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Issue, category, code, message)
    }

    /// Shorthand for an advisory finding.
    #[must_use]
    pub fn warning(category: Category, code: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, category, code, message)
    }

    /// Set the plugin-relative file this finding refers to.
    #[must_use]
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Returns `true` if this finding blocks the plugin.
    #[must_use]
    pub fn is_issue(&self) -> bool {
        self.severity == Severity::Issue
    }

    /// Returns `true` if this finding is advisory.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

/// Display format: issues print the bare message, warnings get a prefix.
impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Issue => write!(f, "{}", self.message),
            Severity::Warning => write!(f, "warning: {}", self.message),
        }
    }
}

// ── Finding code constants ──────────────────────────────────────────────

// Manifest parse and schema (M001–M016)

/// Manifest unreadable, not valid JSON, or not an object.
pub const M001: &str = "M001";
/// Missing required top-level field.
pub const M002: &str = "M002";
/// Manifest `id` does not match the directory name.
pub const M003: &str = "M003";
/// Field must be an array.
pub const M004: &str = "M004";
/// Hook name outside the known vocabulary.
pub const M005: &str = "M005";
/// Hook entry is not a string.
pub const M006: &str = "M006";
/// Variable missing `name` or `id`.
pub const M007: &str = "M007";
/// Variable `type` outside the known set.
pub const M008: &str = "M008";
/// `select` variable without `options`.
pub const M009: &str = "M009";
/// Duplicate variable `id`.
pub const M010: &str = "M010";
/// Action missing `label` or `type`.
pub const M011: &str = "M011";
/// Popup or redirect action missing `route`.
pub const M012: &str = "M012";
/// Action `type` outside the known set.
pub const M013: &str = "M013";
/// Action `route` not declared in `routes`.
pub const M014: &str = "M014";
/// Dynamic variable missing `name` or `id`.
pub const M015: &str = "M015";
/// Dynamic variable `type` outside the known set.
pub const M016: &str = "M016";

// Layout (L001–L003)

/// Missing required file.
pub const L001: &str = "L001";
/// Missing recommended file.
pub const L002: &str = "L002";
/// Routes declared but routing module missing.
pub const L003: &str = "L003";

// Security (S001–S002)

/// Dangerous code pattern in a category.
pub const S001: &str = "S001";
/// Disallowed package in the dependency manifest.
pub const S002: &str = "S002";

// Consistency (C001–C004)

/// Module has no default class export.
pub const C001: &str = "C001";
/// Class has no `init` entry point.
pub const C002: &str = "C002";
/// `init` does not return a `HOOKS` mapping.
pub const C003: &str = "C003";
/// Declared hook has no handler.
pub const C004: &str = "C004";

// Dependency (D001–D002)

/// Dependency manifest malformed.
pub const D001: &str = "D001";
/// Dependency duplicates a host-provided core package.
pub const D002: &str = "D002";

// Scan I/O

/// File could not be read during scanning.
pub const IO01: &str = "IO01";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_display_no_prefix() {
        let f = Finding::issue(Category::Structural, L001, "Missing required file: index.js");
        assert_eq!(f.to_string(), "Missing required file: index.js");
    }

    #[test]
    fn warning_display_with_prefix() {
        let f = Finding::warning(Category::Structural, L002, "Missing recommended file: README.md");
        assert_eq!(f.to_string(), "warning: Missing recommended file: README.md");
    }

    #[test]
    fn severity_predicates() {
        let i = Finding::issue(Category::Security, S001, "x");
        assert!(i.is_issue());
        assert!(!i.is_warning());
        let w = Finding::warning(Category::Dependency, D002, "x");
        assert!(w.is_warning());
        assert!(!w.is_issue());
    }

    #[test]
    fn with_file_sets_file() {
        let f = Finding::issue(Category::Security, S001, "x").with_file("lib/util.js");
        assert_eq!(f.file.as_deref(), Some("lib/util.js"));
    }

    #[test]
    fn category_taxonomy_names() {
        assert_eq!(Category::ManifestParse.to_string(), "ManifestParseError");
        assert_eq!(Category::Consistency.to_string(), "ConsistencyError");
        assert_eq!(Category::ScanIo.to_string(), "ScanIOError");
    }

    #[test]
    fn serialize_json_issue() {
        let f = Finding::issue(Category::Consistency, C004, "Hook 'query' missing");
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["severity"], "issue");
        assert_eq!(json["category"], "consistency");
        assert_eq!(json["code"], "C004");
        assert!(json.get("file").is_none());
    }

    #[test]
    fn finding_codes_are_unique() {
        let codes = [
            M001, M002, M003, M004, M005, M006, M007, M008, M009, M010, M011, M012, M013, M014,
            M015, M016, L001, L002, L003, S001, S002, C001, C002, C003, C004, D001, D002, IO01,
        ];
        let mut seen = std::collections::HashSet::new();
        for code in &codes {
            assert!(seen.insert(code), "duplicate finding code: {code}");
        }
    }
}
