use crate::core::error::XToolResult;
use crate::core::http::build_http_client;
use crate::core::instance::InstanceManager;
use crate::core::registry::Registry;
use crate::core::snapshot::SnapshotManager;
use crate::core::version::VersionManager;

use super::paths::AppPaths;

/// Everything a command needs: the loaded registry and the managers.
pub struct AppState {
    pub paths: AppPaths,
    pub registry: Registry,
    pub versions: VersionManager,
    pub instances: InstanceManager,
    pub snapshots: SnapshotManager,
}

impl AppState {
    /// Prepare the data root, load the registry and migrate archives left by
    /// older layouts.
    pub async fn open(paths: AppPaths, show_progress: bool) -> XToolResult<Self> {
        paths.ensure_layout()?;
        let registry = Registry::load(&paths.registry_file())?;

        let client = build_http_client()?;
        let versions =
            VersionManager::new(paths.versions_dir(), client).with_progress(show_progress);
        let instances = InstanceManager::new(paths.instances_dir(), versions.clone());
        let snapshots = SnapshotManager::new(paths.snapshots_dir(), instances.clone());

        versions.migrate(&registry).await?;

        Ok(Self {
            paths,
            registry,
            versions,
            instances,
            snapshots,
        })
    }
}
