//! Static validation of host-application plugin packages.

pub mod batch;
pub mod consistency;
pub mod dependencies;
pub mod diagnostics;
pub mod errors;
pub mod layout;
pub mod manifest;
pub mod registry;
pub mod report;
pub mod rules;
pub mod scanner;
pub mod structure;
pub mod validator;

// Re-export key types at crate root for convenience.
pub use batch::{default_jobs, discover_plugins, validate_all, validate_plugins, DiscoveredPlugin};
pub use diagnostics::{Category, Finding, Severity};
pub use errors::{PlugcheckError, Result};
pub use layout::PluginLayout;
pub use manifest::PluginManifest;
pub use registry::{register_plugin, Registry, RegistryEntry};
pub use report::{BatchSummary, ValidationReport, Verdict};
pub use rules::{RuleConfig, RuleSet};
pub use validator::{plugin_id_from_path, resolve_plugin_dir, Validator};
