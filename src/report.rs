//! Per-plugin reports, verdicts, and batch rollups.

use std::fmt::Write as _;
use std::path::PathBuf;

use serde::{Serialize, Serializer};

use crate::diagnostics::Finding;

/// Aggregate outcome of one plugin's validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    PassWithWarnings,
    Fail,
}

impl Verdict {
    /// `fail` iff any issue; else `pass_with_warnings` iff any warning; else `pass`.
    #[must_use]
    pub fn from_findings(findings: &[Finding]) -> Self {
        if findings.iter().any(Finding::is_issue) {
            Verdict::Fail
        } else if findings.iter().any(Finding::is_warning) {
            Verdict::PassWithWarnings
        } else {
            Verdict::Pass
        }
    }

    /// Returns `true` for `pass` and `pass_with_warnings`.
    #[must_use]
    pub fn is_passing(self) -> bool {
        self != Verdict::Fail
    }

    /// Result line used in rendered reports.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Verdict::Pass => "PASSED",
            Verdict::PassWithWarnings => "PASSED WITH WARNINGS",
            Verdict::Fail => "FAILED",
        }
    }
}

/// Immutable result of validating one plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    plugin_id: String,
    #[serde(serialize_with = "serialize_path")]
    plugin_path: PathBuf,
    verdict: Verdict,
    issues: usize,
    warnings: usize,
    findings: Vec<Finding>,
}

fn serialize_path<S: Serializer>(path: &PathBuf, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&path.display().to_string())
}

impl ValidationReport {
    /// Build a report; the verdict is derived from the findings.
    #[must_use]
    pub fn new(plugin_id: impl Into<String>, plugin_path: PathBuf, findings: Vec<Finding>) -> Self {
        let verdict = Verdict::from_findings(&findings);
        Self {
            plugin_id: plugin_id.into(),
            plugin_path,
            verdict,
            issues: findings.iter().filter(|f| f.is_issue()).count(),
            warnings: findings.iter().filter(|f| f.is_warning()).count(),
            findings,
        }
    }

    #[must_use]
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    #[must_use]
    pub fn plugin_path(&self) -> &std::path::Path {
        &self.plugin_path
    }

    #[must_use]
    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// All findings in check order.
    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Blocking findings.
    pub fn issues(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_issue())
    }

    /// Advisory findings.
    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_warning())
    }

    /// Human-readable summary.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Plugin Validation Results ===");
        let _ = writeln!(out, "Plugin ID: {}", self.plugin_id);
        let _ = writeln!(out, "Plugin Path: {}", self.plugin_path.display());

        if self.findings.is_empty() {
            let _ = writeln!(out, "\nPlugin passed all validation checks.");
            let _ = writeln!(out, "\nResult: {}", self.verdict.label());
            return out;
        }

        if self.issues > 0 {
            let _ = writeln!(out, "\nIssues Found ({}):", self.issues);
            for (i, f) in self.issues().enumerate() {
                let _ = writeln!(out, "  {}. [{}] {}", i + 1, f.code, f.message);
            }
        }
        if self.warnings > 0 {
            let _ = writeln!(out, "\nWarnings ({}):", self.warnings);
            for (i, f) in self.warnings().enumerate() {
                let _ = writeln!(out, "  {}. [{}] {}", i + 1, f.code, f.message);
            }
        }
        let _ = writeln!(out, "\nResult: {}", self.verdict.label());
        out
    }
}

/// A plugin that could not be validated at all.
#[derive(Debug, Clone, Serialize)]
pub struct Unvalidated {
    pub plugin_id: String,
    pub error: String,
}

/// Rollup over an all-plugins run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub reports: Vec<ValidationReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unvalidated: Vec<Unvalidated>,
}

impl BatchSummary {
    /// Build a rollup; unvalidated plugins count as failed.
    #[must_use]
    pub fn new(reports: Vec<ValidationReport>, unvalidated: Vec<Unvalidated>) -> Self {
        let passed = reports.iter().filter(|r| r.verdict().is_passing()).count();
        let total = reports.len() + unvalidated.len();
        Self {
            total,
            passed,
            failed: total - passed,
            reports,
            unvalidated,
        }
    }

    /// Process exit status: 0 when nothing failed, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(self.failed > 0)
    }

    /// Rollup section of the text output.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Validation Summary ===");
        let _ = writeln!(out, "Total plugins: {}", self.total);
        let _ = writeln!(out, "Passed: {}", self.passed);
        let _ = writeln!(out, "Failed: {}", self.failed);
        for u in &self.unvalidated {
            let _ = writeln!(out, "  {}: {}", u.plugin_id, u.error);
        }
        out
    }
}
