use std::cmp::Ordering;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{error, info};

use super::manager::InstanceManager;
use crate::core::error::{XToolError, XToolResult};
use crate::core::naming::suffixed_name;
use crate::core::registry::Registry;
use crate::core::tree::{copy_tree, remove_path};
use crate::core::version::{compare_versions, is_prerelease};

/// WEB-INF configuration files reconciled on upgrade.
pub const CONFIG_FILES: &[&str] = &["xwiki.cfg", "xwiki.properties", "hibernate.cfg.xml"];
/// Permanent directory carried over from the old instance.
pub const DATA_DIR: &str = "data";

const SNAPSHOT_REPOSITORY_HINT: &str = "extension.repositories = maven-xwiki-snapshot:maven:\
                                        https://nexus.xwiki.org/nexus/content/groups/public-snapshots";

/// What happened to one configuration file during an upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigResolution {
    /// Old and new files are identical.
    Unchanged,
    /// The old file was kept; the new one is stored next to it as `.new`.
    KeptOld,
    /// The new file was kept; the old one is stored next to it as `.orig`.
    KeptNew,
    /// One side does not have the file.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeReport {
    pub from: String,
    pub to: String,
    pub config_files: Vec<(String, ConfigResolution)>,
}

impl InstanceManager {
    /// Move instance `name` to `version`, keeping its data and reconciling
    /// its configuration files.
    ///
    /// Unless `force` is set the target must be newer than the current
    /// version. With `keepconf` the old configuration stays in place.
    pub async fn upgrade(
        &self,
        registry: &mut Registry,
        name: &str,
        version: &str,
        force: bool,
        keepconf: bool,
    ) -> XToolResult<UpgradeReport> {
        let current = registry
            .find_instance(name)
            .map(|i| i.version.clone())
            .ok_or_else(|| XToolError::InstanceNotFound(name.to_string()))?;

        if !force && compare_versions(&current, version) != Ordering::Less {
            let reason = if is_prerelease(version) {
                format!("snapshot version {version} is not newer than {current}, use --force")
            } else {
                format!("version {version} is not newer than {current}")
            };
            return Err(XToolError::UpgradeRejected {
                instance: name.to_string(),
                reason,
            });
        }

        self.versions().ensure_version(registry, version).await?;

        if !is_prerelease(&current) && is_prerelease(version) {
            info!("Note: when upgrading to a SNAPSHOT version, you might need to uncomment this in xwiki.properties:");
            info!("---");
            info!("{}", SNAPSHOT_REPOSITORY_HINT);
            info!("---");
        }

        info!("Upgrading instance {} from {} to {}", name, current, version);
        let aside = suffixed_name(name);
        self.copy(registry, name, &aside)?;
        self.remove(registry, name)?;
        if let Err(e) = self.create(registry, name, version).await {
            error!(
                "Could not recreate instance {}, its previous state is kept as instance {}",
                name, aside
            );
            return Err(e);
        }

        let old_web_inf = self.web_inf_path(&aside);
        let new_web_inf = self.web_inf_path(name);
        let mut config_files = Vec::with_capacity(CONFIG_FILES.len());
        for file in CONFIG_FILES {
            let resolution =
                reconcile_config(&old_web_inf.join(file), &new_web_inf.join(file), keepconf)?;
            config_files.push((file.to_string(), resolution));
        }

        let old_data = self.instance_path(&aside).join(DATA_DIR);
        let new_data = self.instance_path(name).join(DATA_DIR);
        remove_path(&new_data)?;
        if old_data.is_dir() {
            copy_tree(&old_data, &new_data)?;
        }

        self.remove(registry, &aside)?;
        info!("Instance {} upgraded to {}", name, version);

        Ok(UpgradeReport {
            from: current,
            to: version.to_string(),
            config_files,
        })
    }
}

fn reconcile_config(old: &Path, new: &Path, keepconf: bool) -> XToolResult<ConfigResolution> {
    let file_name = new
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    if !old.is_file() || !new.is_file() {
        info!("Configuration file {} is missing on one side, skipping", file_name);
        return Ok(ConfigResolution::Missing);
    }

    let old_content = std::fs::read(old).map_err(|e| XToolError::io(old, e))?;
    let new_content = std::fs::read(new).map_err(|e| XToolError::io(new, e))?;
    if old_content == new_content {
        info!("Configuration file {} does not need to be updated", file_name);
        return Ok(ConfigResolution::Unchanged);
    }

    info!("Configuration file {} needs to be updated", file_name);
    if keepconf {
        let stored = with_suffix(new, "new");
        write(&stored, &new_content)?;
        write(new, &old_content)?;
        info!("Kept the previous file, new one stored in {:?}", stored);
        Ok(ConfigResolution::KeptOld)
    } else {
        let stored = with_suffix(new, "orig");
        write(&stored, &old_content)?;
        info!("Kept the new file, previous one stored in {:?}", stored);
        Ok(ConfigResolution::KeptNew)
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn write(path: &Path, content: &[u8]) -> XToolResult<()> {
    std::fs::write(path, content).map_err(|e| XToolError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instance::manager::WEB_INF;
    use crate::core::version::VersionManager;
    use reqwest::Client;
    use std::fs;

    fn setup(root: &Path) -> (InstanceManager, Registry) {
        let versions = VersionManager::new(root.join("versions"), Client::new());
        let manager = InstanceManager::new(root.join("instances"), versions);
        let registry = Registry::load(&root.join("config/config.json")).unwrap();
        (manager, registry)
    }

    fn fake_version(manager: &InstanceManager, registry: &mut Registry, version: &str, cfg: &str) {
        let dir = manager.versions().directory_path(version);
        fs::create_dir_all(dir.join(WEB_INF)).unwrap();
        fs::create_dir_all(dir.join(DATA_DIR)).unwrap();
        fs::write(dir.join(WEB_INF).join("xwiki.cfg"), cfg).unwrap();
        fs::write(dir.join(WEB_INF).join("xwiki.properties"), "same\n").unwrap();
        fs::write(dir.join("VERSION"), version).unwrap();
        registry.add_version(version);
    }

    async fn upgraded(keepconf: bool) -> (tempfile::TempDir, InstanceManager, UpgradeReport) {
        let dir = tempfile::tempdir().unwrap();
        let (manager, mut registry) = setup(dir.path());
        fake_version(&manager, &mut registry, "15.10", "old=1\n");
        fake_version(&manager, &mut registry, "16.0", "new=1\n");

        manager.create(&mut registry, "dev", "15.10").await.unwrap();
        fs::write(manager.instance_path("dev").join("data/page.xml"), "kept").unwrap();

        let report = manager
            .upgrade(&mut registry, "dev", "16.0", false, keepconf)
            .await
            .unwrap();
        assert_eq!(registry.find_instance("dev").unwrap().version, "16.0");
        assert_eq!(registry.instances().len(), 1);
        (dir, manager, report)
    }

    #[tokio::test]
    async fn upgrade_keeps_data_and_stores_old_config_as_orig() {
        let (_dir, manager, report) = upgraded(false).await;
        let root = manager.instance_path("dev");
        let web_inf = manager.web_inf_path("dev");

        assert_eq!(fs::read_to_string(root.join("VERSION")).unwrap(), "16.0");
        assert_eq!(fs::read_to_string(root.join("data/page.xml")).unwrap(), "kept");
        assert_eq!(fs::read_to_string(web_inf.join("xwiki.cfg")).unwrap(), "new=1\n");
        assert_eq!(fs::read_to_string(web_inf.join("xwiki.cfg.orig")).unwrap(), "old=1\n");
        assert!(report
            .config_files
            .contains(&("xwiki.properties".to_string(), ConfigResolution::Unchanged)));
        assert!(report
            .config_files
            .contains(&("hibernate.cfg.xml".to_string(), ConfigResolution::Missing)));
    }

    #[tokio::test]
    async fn keepconf_restores_old_config_and_stores_new_one() {
        let (_dir, manager, report) = upgraded(true).await;
        let web_inf = manager.web_inf_path("dev");

        assert_eq!(fs::read_to_string(web_inf.join("xwiki.cfg")).unwrap(), "old=1\n");
        assert_eq!(fs::read_to_string(web_inf.join("xwiki.cfg.new")).unwrap(), "new=1\n");
        assert_eq!(report.config_files[0], ("xwiki.cfg".to_string(), ConfigResolution::KeptOld));
    }

    #[tokio::test]
    async fn downgrade_needs_force() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, mut registry) = setup(dir.path());
        fake_version(&manager, &mut registry, "15.10", "a\n");
        fake_version(&manager, &mut registry, "14.10", "b\n");
        manager.create(&mut registry, "dev", "15.10").await.unwrap();

        let err = manager
            .upgrade(&mut registry, "dev", "14.10", false, false)
            .await
            .unwrap_err();
        assert!(matches!(err, XToolError::UpgradeRejected { .. }));
        assert_eq!(registry.find_instance("dev").unwrap().version, "15.10");

        manager
            .upgrade(&mut registry, "dev", "14.10", true, false)
            .await
            .unwrap();
        assert_eq!(registry.find_instance("dev").unwrap().version, "14.10");
    }
}
