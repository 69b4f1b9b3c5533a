use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use super::model::{InstanceRecord, Preferences, RegistryDocument, SnapshotRecord};
use crate::core::error::{XToolError, XToolResult};
use crate::core::version::identifier::compare_versions;

/// The persisted registry of versions, instances, snapshots and preferences.
///
/// Mutations only change the in-memory document; callers invoke
/// [`Registry::persist`] once their filesystem side effects have succeeded.
/// There is no locking: concurrent writers overwrite each other.
#[derive(Debug)]
pub struct Registry {
    path: PathBuf,
    document: RegistryDocument,
}

impl Registry {
    /// Load the registry at `path`, writing a default one if absent.
    pub fn load(path: &Path) -> XToolResult<Self> {
        if !path.exists() {
            info!("No registry at {:?}, creating a default one", path);
            let mut registry = Self {
                path: path.to_path_buf(),
                document: RegistryDocument::default(),
            };
            registry.persist()?;
            return Ok(registry);
        }

        let raw = std::fs::read_to_string(path).map_err(|source| XToolError::io(path, source))?;
        let document = parse_document(&raw)?;
        debug!(
            "Loaded registry: {} versions, {} instances, {} snapshots",
            document.versions.len(),
            document.instances.len(),
            document.snapshots.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            document,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &RegistryDocument {
        &self.document
    }

    // ── Versions ────────────────────────────────────────

    pub fn versions(&self) -> &[String] {
        &self.document.versions
    }

    pub fn has_version(&self, version: &str) -> bool {
        self.document.versions.iter().any(|v| v == version)
    }

    pub fn add_version(&mut self, version: &str) {
        if !self.has_version(version) {
            self.document.versions.push(version.to_string());
        }
    }

    /// Returns whether the version was registered.
    pub fn remove_version(&mut self, version: &str) -> bool {
        let before = self.document.versions.len();
        self.document.versions.retain(|v| v != version);
        before != self.document.versions.len()
    }

    // ── Instances ───────────────────────────────────────

    pub fn instances(&self) -> &[InstanceRecord] {
        &self.document.instances
    }

    pub fn find_instance(&self, name: &str) -> Option<&InstanceRecord> {
        self.document.instances.iter().find(|i| i.name == name)
    }

    pub fn find_instance_mut(&mut self, name: &str) -> Option<&mut InstanceRecord> {
        self.document.instances.iter_mut().find(|i| i.name == name)
    }

    pub fn has_instance(&self, name: &str) -> bool {
        self.find_instance(name).is_some()
    }

    pub fn add_instance(&mut self, record: InstanceRecord) -> XToolResult<()> {
        if self.has_instance(&record.name) {
            return Err(XToolError::InstanceAlreadyExists(record.name));
        }
        self.document.instances.push(record);
        Ok(())
    }

    pub fn remove_instance(&mut self, name: &str) -> Option<InstanceRecord> {
        let index = self.document.instances.iter().position(|i| i.name == name)?;
        Some(self.document.instances.remove(index))
    }

    // ── Snapshots ───────────────────────────────────────

    pub fn snapshots(&self) -> &[SnapshotRecord] {
        &self.document.snapshots
    }

    pub fn find_snapshot(&self, name: &str) -> Option<&SnapshotRecord> {
        self.document.snapshots.iter().find(|s| s.name == name)
    }

    pub fn add_snapshot(&mut self, record: SnapshotRecord) {
        self.document.snapshots.push(record);
    }

    pub fn remove_snapshot(&mut self, name: &str) -> Option<SnapshotRecord> {
        let index = self.document.snapshots.iter().position(|s| s.name == name)?;
        Some(self.document.snapshots.remove(index))
    }

    // ── Preferences ─────────────────────────────────────

    pub fn preferences(&self) -> &Preferences {
        &self.document.preferences
    }

    pub fn preference(&self, key: &str) -> Option<Value> {
        self.document.preferences.get(key)
    }

    pub fn set_preference(&mut self, key: &str, value: Value) -> XToolResult<()> {
        self.document.preferences.set(key, value)
    }

    // ── Persistence ─────────────────────────────────────

    /// Write the whole document: versions in version order, instances by
    /// name, object keys sorted. The file is replaced atomically.
    pub fn persist(&mut self) -> XToolResult<()> {
        self.document
            .versions
            .sort_by(|a, b| compare_versions(a, b));
        self.document.instances.sort_by(|a, b| a.name.cmp(&b.name));

        // `Value` objects keep their keys sorted.
        let mut value = serde_json::to_value(&self.document)?;
        if let Some(Value::Array(snapshots)) = value.get_mut("snapshots") {
            snapshots.extend(self.document.unreadable_snapshots.iter().cloned());
        }
        let mut json = serde_json::to_string_pretty(&value)?;
        json.push('\n');

        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|source| XToolError::io(parent, source))?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|source| XToolError::io(parent, source))?;
        tmp.write_all(json.as_bytes())
            .map_err(|source| XToolError::io(tmp.path(), source))?;
        tmp.persist(&self.path)
            .map_err(|e| XToolError::io(&self.path, e.error))?;

        debug!("Registry saved to {:?}", self.path);
        Ok(())
    }
}

/// Parse the registry document. A snapshot entry that cannot be read is
/// set aside with a warning instead of failing the whole document.
fn parse_document(raw: &str) -> XToolResult<RegistryDocument> {
    let mut value: Value = serde_json::from_str(raw)?;
    let entries = match value.as_object_mut().and_then(|o| o.remove("snapshots")) {
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            return Err(XToolError::Other(format!(
                "Registry field \"snapshots\" must be a list, found {other}"
            )))
        }
        None => Vec::new(),
    };

    let mut document: RegistryDocument = serde_json::from_value(value)?;
    for entry in entries {
        match serde_json::from_value::<SnapshotRecord>(entry.clone()) {
            Ok(record) => document.snapshots.push(record),
            Err(e) => {
                let name = entry.get("name").and_then(Value::as_str).unwrap_or("?");
                warn!("Ignoring unreadable snapshot record {}: {}", name, e);
                document.unreadable_snapshots.push(entry);
            }
        }
    }
    Ok(document)
}
