//! All-plugins mode: discovery and isolated, parallel validation.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tracing::{info, warn};

use crate::errors::Result;
use crate::report::{BatchSummary, Unvalidated, ValidationReport};
use crate::validator::Validator;

/// A plugin directory found under the plugins root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPlugin {
    pub id: String,
    pub path: PathBuf,
}

/// Names starting with these characters are reserved (templates, hidden).
fn is_reserved(name: &str) -> bool {
    name.starts_with('_') || name.starts_with('.')
}

/// List plugin directories under `plugins_dir`, sorted by id.
///
/// Non-directories and reserved names are skipped.
pub fn discover_plugins(plugins_dir: &Path) -> Result<Vec<DiscoveredPlugin>> {
    let mut plugins = Vec::new();
    for entry in std::fs::read_dir(plugins_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let path = entry.path();
        if !path.is_dir() || is_reserved(&name) {
            continue;
        }
        plugins.push(DiscoveredPlugin { id: name, path });
    }
    plugins.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(plugins)
}

/// Number of workers used when the caller does not specify one.
#[must_use]
pub fn default_jobs() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Validate every discovered plugin on up to `jobs` scoped worker threads.
///
/// Each plugin is validated in isolation; results are returned in id order
/// regardless of scheduling.
#[must_use]
pub fn validate_plugins(
    validator: &Validator,
    plugins: &[DiscoveredPlugin],
    jobs: usize,
) -> BatchSummary {
    let workers = jobs.clamp(1, plugins.len().max(1));
    let next = AtomicUsize::new(0);
    let results: Mutex<Vec<(usize, Result<ValidationReport>)>> =
        Mutex::new(Vec::with_capacity(plugins.len()));

    std::thread::scope(|s| {
        for _ in 0..workers {
            s.spawn(|| loop {
                let i = next.fetch_add(1, Ordering::Relaxed);
                let Some(plugin) = plugins.get(i) else {
                    break;
                };
                let outcome = validator.validate(&plugin.id, &plugin.path);
                results
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .push((i, outcome));
            });
        }
    });

    let mut results = results
        .into_inner()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    results.sort_by_key(|(i, _)| *i);

    let mut reports = Vec::with_capacity(results.len());
    let mut unvalidated = Vec::new();
    for (i, outcome) in results {
        match outcome {
            Ok(report) => reports.push(report),
            Err(e) => {
                warn!(plugin = %plugins[i].id, error = %e, "plugin could not be validated");
                unvalidated.push(Unvalidated {
                    plugin_id: plugins[i].id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    let summary = BatchSummary::new(reports, unvalidated);
    info!(
        total = summary.total,
        passed = summary.passed,
        failed = summary.failed,
        "batch validation finished"
    );
    summary
}

/// Discover and validate every plugin under `plugins_dir`.
pub fn validate_all(
    validator: &Validator,
    plugins_dir: &Path,
    jobs: usize,
) -> Result<BatchSummary> {
    let plugins = discover_plugins(plugins_dir)?;
    info!(count = plugins.len(), dir = %plugins_dir.display(), "discovered plugins");
    Ok(validate_plugins(validator, &plugins, jobs))
}
