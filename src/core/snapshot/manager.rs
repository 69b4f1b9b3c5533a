use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};

use super::diff::{diff_trees, stage_changes};
use crate::core::archive::{create_archive, unpack_archive};
use crate::core::error::{XToolError, XToolResult};
use crate::core::instance::InstanceManager;
use crate::core::naming::suffixed_name;
use crate::core::registry::{Registry, SnapshotRecord};
use crate::core::tree::remove_path;

/// Stores instance state as deltas against its reference version.
#[derive(Debug, Clone)]
pub struct SnapshotManager {
    snapshots_dir: PathBuf,
    instances: InstanceManager,
}

impl SnapshotManager {
    pub fn new(snapshots_dir: PathBuf, instances: InstanceManager) -> Self {
        Self {
            snapshots_dir,
            instances,
        }
    }

    pub fn archive_path(&self, record: &SnapshotRecord) -> PathBuf {
        self.snapshots_dir.join(record.archive_file_name())
    }

    /// Snapshot the current state of an instance.
    pub async fn create(&self, registry: &mut Registry, instance_name: &str) -> XToolResult<SnapshotRecord> {
        let version = registry
            .find_instance(instance_name)
            .map(|i| i.version.clone())
            .ok_or_else(|| XToolError::InstanceNotFound(instance_name.to_string()))?;

        let versions = self.instances.versions();
        versions.ensure_version(registry, &version).await?;

        let format = registry.preferences().snapshot_format;
        let mut name = suffixed_name(instance_name);
        while registry.find_snapshot(&name).is_some() {
            name = suffixed_name(instance_name);
        }

        let mut record = SnapshotRecord {
            name,
            instance_name: instance_name.to_string(),
            version: version.clone(),
            date: Utc::now(),
            format,
            removed_elements: Vec::new(),
        };
        let archive = self.archive_path(&record);
        let reference = versions.directory_path(&version);
        let instance = self.instances.instance_path(instance_name);

        info!("Creating snapshot {} of instance {}", record.name, instance_name);
        let target = archive.clone();
        let built = tokio::task::spawn_blocking(move || -> XToolResult<Vec<String>> {
            let diff = diff_trees(&reference, &instance)?;
            debug!(
                "{} removed and {} changed entries",
                diff.removed.len(),
                diff.changed.len()
            );

            let staging = tempfile::TempDir::new()
                .map_err(|e| XToolError::io(std::env::temp_dir(), e))?;
            stage_changes(&instance, &diff.changed, staging.path())?;
            create_archive(staging.path(), &target, format)?;
            Ok(diff.removed)
        })
        .await
        .map_err(|e| XToolError::Other(format!("Snapshot task failed: {e}")))?;

        record.removed_elements = match built {
            Ok(removed) => removed,
            Err(e) => {
                remove_path(&archive)?;
                return Err(e);
            }
        };

        registry.add_snapshot(record.clone());
        registry.persist()?;
        info!("Snapshot {} stored in {:?}", record.name, archive);
        Ok(record)
    }

    /// Rebuild the snapshotted instance: its reference version, minus the
    /// removed elements, plus the stored delta.
    pub async fn restore(&self, registry: &mut Registry, name: &str, overwrite: bool) -> XToolResult<()> {
        let record = registry
            .find_snapshot(name)
            .cloned()
            .ok_or_else(|| XToolError::SnapshotNotFound(name.to_string()))?;

        let archive = self.archive_path(&record);
        if !archive.is_file() {
            return Err(XToolError::Other(format!(
                "Archive of snapshot {name} is missing: {}",
                archive.display()
            )));
        }
        let instance = self.instances.instance_path(&record.instance_name);
        let removed = record
            .removed_elements
            .iter()
            .map(|rel| resolve_inside(&instance, rel))
            .collect::<XToolResult<Vec<_>>>()?;

        if registry.has_instance(&record.instance_name) {
            if !overwrite {
                return Err(XToolError::InstanceAlreadyExists(record.instance_name));
            }
            info!("Overwriting instance {}", record.instance_name);
            self.instances.remove(registry, &record.instance_name)?;
        }

        info!("Restoring snapshot {} into instance {}", name, record.instance_name);
        self.instances
            .create(registry, &record.instance_name, &record.version)
            .await?;

        for path in &removed {
            remove_path(path)?;
        }

        let format = record.format;
        tokio::task::spawn_blocking(move || unpack_archive(&archive, &instance, format))
            .await
            .map_err(|e| XToolError::Other(format!("Restore task failed: {e}")))??;

        info!("Snapshot {} restored", name);
        Ok(())
    }

    /// Delete a snapshot archive and its record.
    pub fn remove(&self, registry: &mut Registry, name: &str) -> XToolResult<()> {
        let record = registry
            .find_snapshot(name)
            .cloned()
            .ok_or_else(|| XToolError::SnapshotNotFound(name.to_string()))?;

        remove_path(&self.archive_path(&record))?;
        registry.remove_snapshot(name);
        registry.persist()?;
        info!("Snapshot {} removed", name);
        Ok(())
    }
}

/// Join a recorded `/`-separated path onto `root`, refusing anything that
/// could point outside of it.
fn resolve_inside(root: &Path, relative: &str) -> XToolResult<PathBuf> {
    let mut resolved = root.to_path_buf();
    let mut depth = 0;
    for part in relative.split('/').filter(|p| !p.is_empty() && *p != ".") {
        let mut components = Path::new(part).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(normal)), None) => {
                resolved.push(normal);
                depth += 1;
            }
            _ => {
                return Err(XToolError::Other(format!(
                    "Refusing to remove {relative:?}: not inside the instance"
                )))
            }
        }
    }
    if depth == 0 {
        return Err(XToolError::Other(format!(
            "Refusing to remove {relative:?}: not inside the instance"
        )));
    }
    Ok(resolved)
}
