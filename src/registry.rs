//! Persisted catalog of validated plugins (`registry.json`).
//!
//! The registry is the only state shared across runs. Every update is a
//! read-merge-write performed under an exclusive advisory lock on a sidecar
//! `<registry>.lock` file, so concurrent runs cannot interleave writes or
//! drop each other's entries.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::errors::{PlugcheckError, Result};
use crate::layout::PluginLayout;

/// One validated plugin: its manifest fields plus validation metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Manifest fields, as declared.
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
    pub validated: bool,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub validation_date: DateTime<Utc>,
}

/// Accept RFC 3339 timestamps as well as offset-less ones (taken as UTC).
fn deserialize_timestamp<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<DateTime<Utc>, D::Error> {
    let s = String::deserialize(d)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

impl RegistryEntry {
    /// Build an entry from manifest fields, stamped with `validation_date`.
    #[must_use]
    pub fn new(mut metadata: Map<String, Value>, validation_date: DateTime<Utc>) -> Self {
        metadata.remove("validated");
        metadata.remove("validation_date");
        Self {
            metadata,
            validated: true,
            validation_date,
        }
    }

    /// Build an entry from the plugin's manifest on disk.
    ///
    /// Falls back to a minimal `{id, name, description}` record when the
    /// manifest cannot be read as a JSON object.
    #[must_use]
    pub fn from_plugin_dir(
        dir: &Path,
        plugin_id: &str,
        layout: &PluginLayout,
        validation_date: DateTime<Utc>,
    ) -> Self {
        let metadata = std::fs::read_to_string(layout.manifest_path(dir))
            .ok()
            .and_then(|c| serde_json::from_str::<Value>(&c).ok())
            .and_then(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_else(|| {
                let mut map = Map::new();
                map.insert("id".to_string(), Value::from(plugin_id));
                map.insert("name".to_string(), Value::from(plugin_id));
                map.insert(
                    "description".to_string(),
                    Value::from("No description available"),
                );
                map
            });
        Self::new(metadata, validation_date)
    }
}

/// The registry document: `{ "plugins": { <id>: RegistryEntry } }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub plugins: BTreeMap<String, RegistryEntry>,
    /// Other top-level keys, preserved across rewrites.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Registry {
    /// Read the registry; a missing file is an empty registry.
    ///
    /// An unreadable or corrupt file is an error: the registry is never
    /// silently reset.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(registry_error(path, format!("failed to read: {e}"))),
        };
        serde_json::from_str(&content).map_err(|e| registry_error(path, format!("failed to parse: {e}")))
    }

    /// Write the registry atomically.
    ///
    /// The document goes to a temporary file in the same directory, is
    /// synced to disk, then renamed over `path`. The temporary file is
    /// removed if any step fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent)
            .map_err(|e| registry_error(path, format!("failed to create directory: {e}")))?;

        let json = serde_json::to_string_pretty(self)? + "\n";
        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| {
            registry_error(path, format!("failed to create temp file for atomic write: {e}"))
        })?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| registry_error(path, format!("failed to write temp registry: {e}")))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| registry_error(path, format!("failed to sync temp registry: {e}")))?;
        tmp.persist(path)
            .map_err(|e| registry_error(path, format!("failed to replace registry: {e}")))?;
        debug!(path = %path.display(), entries = self.plugins.len(), "registry saved");
        Ok(())
    }

    /// Insert or replace the entry for `plugin_id`; other entries are untouched.
    pub fn merge(&mut self, plugin_id: &str, entry: RegistryEntry) {
        self.plugins.insert(plugin_id.to_string(), entry);
    }
}

/// Exclusive lock on the registry, released when dropped.
#[derive(Debug)]
pub struct RegistryLock {
    file: File,
}

impl RegistryLock {
    /// Block until the exclusive lock for `registry_path` is held.
    pub fn acquire(registry_path: &Path) -> Result<Self> {
        let lock_path = sibling(registry_path, ".lock");
        if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                registry_error(registry_path, format!("failed to create lock directory: {e}"))
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| registry_error(registry_path, format!("failed to open lock file: {e}")))?;
        file.lock_exclusive().map_err(|e| {
            registry_error(registry_path, format!("failed to acquire exclusive lock: {e}"))
        })?;
        debug!(lock = %lock_path.display(), "registry lock acquired");
        Ok(Self { file })
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Merge one entry into the registry at `registry_path` under the lock.
pub fn register_plugin(registry_path: &Path, plugin_id: &str, entry: RegistryEntry) -> Result<()> {
    let _lock = RegistryLock::acquire(registry_path)?;
    let mut registry = Registry::load(registry_path)?;
    registry.merge(plugin_id, entry);
    registry.save(registry_path)?;
    info!(plugin = plugin_id, registry = %registry_path.display(), "plugin added to registry");
    Ok(())
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn registry_error(path: &Path, message: String) -> PlugcheckError {
    PlugcheckError::Registry {
        path: path.to_path_buf(),
        message,
    }
}
