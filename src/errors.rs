use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur outside of per-check validation.
///
/// Problems found *inside* a plugin never surface here; they are reported
/// as [`Finding`](crate::diagnostics::Finding)s on the plugin's report.
#[derive(Error, Debug)]
pub enum PlugcheckError {
    /// The plugin directory to validate does not exist.
    #[error("plugin not found at path: {}", path.display())]
    PluginNotFound { path: PathBuf },

    /// A plugin id that is not a single directory name.
    #[error("invalid plugin id '{id}': must be a single directory name")]
    InvalidPluginId { id: String },

    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML (de)serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Rule set could not be compiled.
    #[error("invalid rule set: {message}")]
    Rules { message: String },

    /// Registry could not be read, locked, or written.
    #[error("registry error at {}: {message}", path.display())]
    Registry { path: PathBuf, message: String },
}

/// Convenience alias for `Result<T, PlugcheckError>`.
pub type Result<T> = std::result::Result<T, PlugcheckError>;
