use std::path::{Path, PathBuf};

use reqwest::Client;
use tracing::{debug, error, info, warn};

use super::identifier::XWikiVersion;
use crate::core::archive::extract_zip_stripped;
use crate::core::downloader::ArchiveDownloader;
use crate::core::error::{XToolError, XToolResult};
use crate::core::maven::distribution_artifact;
use crate::core::registry::Registry;
use crate::core::tree::{make_executable, remove_path};

/// Launcher scripts shipped at the root of every distribution.
pub const START_SCRIPTS: &[&str] = &["start_xwiki.sh", "start_xwiki_debug.sh", "stop_xwiki.sh"];

/// Manages extracted distributions under `versions/`.
#[derive(Debug, Clone)]
pub struct VersionManager {
    versions_dir: PathBuf,
    client: Client,
    show_progress: bool,
}

impl VersionManager {
    pub fn new(versions_dir: PathBuf, client: Client) -> Self {
        Self {
            versions_dir,
            client,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    // ── Layout ──────────────────────────────────────────

    /// Directory name of an extracted version (`<artifactId>-<version>`).
    pub fn base_name(&self, version: &str) -> String {
        distribution_artifact(version).base_name()
    }

    pub fn directory_path(&self, version: &str) -> PathBuf {
        self.versions_dir.join(self.base_name(version))
    }

    pub fn archive_path(&self, version: &str) -> PathBuf {
        self.versions_dir.join(distribution_artifact(version).filename())
    }

    // ── Queries ─────────────────────────────────────────

    /// Registered and extracted.
    pub fn has_version(&self, registry: &Registry, version: &str) -> bool {
        registry.has_version(version) && self.directory_path(version).is_dir()
    }

    // ── Operations ──────────────────────────────────────

    /// Download `version` unless it is already available.
    pub async fn ensure_version(&self, registry: &mut Registry, version: &str) -> XToolResult<()> {
        if self.has_version(registry, version) {
            debug!("Version {} already present", version);
            return Ok(());
        }
        self.download(registry, version).await
    }

    /// Download, verify, extract and register `version`.
    ///
    /// The registry is left untouched on failure.
    pub async fn download(&self, registry: &mut Registry, version: &str) -> XToolResult<()> {
        XWikiVersion::parse(version)?;

        let preferences = registry.preferences();
        let downloader = ArchiveDownloader::new(
            self.client.clone(),
            &preferences.repository_url,
            preferences.checksum_algorithm,
        )
        .with_progress(self.show_progress);

        let archive = self.archive_path(version);
        info!("Downloading XWiki {}", version);
        match downloader.download(version, &archive).await {
            Ok(true) => {}
            Ok(false) => {
                error!("Version {} could not be downloaded", version);
                return Err(XToolError::VersionUnavailable(version.to_string()));
            }
            Err(e) => {
                error!("Download of version {} failed: {}", version, e);
                return Err(XToolError::VersionUnavailable(version.to_string()));
            }
        }

        let directory = self.directory_path(version);
        if let Err(e) = unpack_distribution(archive.clone(), directory.clone()).await {
            error!("Extraction of {:?} failed: {}", archive, e);
            remove_path(&directory)?;
            remove_path(&archive)?;
            return Err(e);
        }
        remove_path(&archive)?;

        registry.add_version(version);
        registry.persist()?;
        info!("Version {} installed in {:?}", version, directory);
        Ok(())
    }

    /// Delete the extracted directory (and any leftover archive) and
    /// unregister the version. Missing paths are ignored; an unknown version
    /// is a no-op.
    pub fn remove_version(&self, registry: &mut Registry, version: &str) -> XToolResult<()> {
        if !registry.has_version(version)
            && !self.directory_path(version).exists()
            && !self.archive_path(version).exists()
        {
            warn!("Version {} is not installed", version);
            return Ok(());
        }

        let users: Vec<&str> = registry
            .instances()
            .iter()
            .filter(|i| i.version == version)
            .map(|i| i.name.as_str())
            .collect();
        if !users.is_empty() {
            warn!("Version {} is still used by: {}", version, users.join(", "));
        }

        remove_path(&self.directory_path(version))?;
        remove_path(&self.archive_path(version))?;
        registry.remove_version(version);
        registry.persist()?;
        info!("Version {} removed", version);
        Ok(())
    }

    /// Remove every version that no instance references. Returns the removed
    /// versions.
    pub fn prune(&self, registry: &mut Registry) -> XToolResult<Vec<String>> {
        let unused: Vec<String> = registry
            .versions()
            .iter()
            .filter(|v| !registry.instances().iter().any(|i| &i.version == *v))
            .cloned()
            .collect();

        for version in &unused {
            self.remove_version(registry, version)?;
        }
        if unused.is_empty() {
            info!("No unused version to prune");
        }
        Ok(unused)
    }

    /// Extract archives of registered versions left behind by older layouts
    /// and delete them.
    pub async fn migrate(&self, registry: &Registry) -> XToolResult<()> {
        for version in registry.versions() {
            let archive = self.archive_path(version);
            if !archive.is_file() {
                continue;
            }

            info!("Migrating version {} to its extracted layout", version);
            let directory = self.directory_path(version);
            remove_path(&directory)?;
            unpack_distribution(archive.clone(), directory).await?;
            remove_path(&archive)?;
        }
        Ok(())
    }
}

async fn unpack_distribution(archive: PathBuf, directory: PathBuf) -> XToolResult<()> {
    tokio::task::spawn_blocking(move || {
        extract_zip_stripped(&archive, &directory)?;
        mark_scripts_executable(&directory)
    })
    .await
    .map_err(|e| XToolError::Other(format!("Extraction task failed: {e}")))?
}

fn mark_scripts_executable(directory: &Path) -> XToolResult<()> {
    for script in START_SCRIPTS {
        make_executable(&directory.join(script))?;
    }
    Ok(())
}
