use std::future::Future;
use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use super::link::link_identical_files;
use crate::core::error::{XToolError, XToolResult};
use crate::core::launch::{spawn_instance, ProcessSupervisor, SupervisorOutcome};
use crate::core::naming::{temporary_instance_name, validate_instance_name};
use crate::core::registry::{InstanceRecord, Registry};
use crate::core::tree::{copy_tree, remove_path};
use crate::core::version::{compare_versions, VersionManager};

/// Location of the editable configuration inside an instance.
pub const WEB_INF: &str = "webapps/xwiki/WEB-INF";
/// Last resort when neither the preference nor `$EDITOR` names an editor.
pub const DEFAULT_EDITOR: &str = "editor";

/// Options of [`InstanceManager::start`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StartOptions {
    pub port: Option<u16>,
    pub debug: bool,
    /// Remove the throwaway instance created for a version once it stops.
    pub temp: bool,
}

/// Creates, copies, starts and removes instances under `instances/`.
#[derive(Debug, Clone)]
pub struct InstanceManager {
    instances_dir: PathBuf,
    versions: VersionManager,
    supervisor: ProcessSupervisor,
}

impl InstanceManager {
    pub fn new(instances_dir: PathBuf, versions: VersionManager) -> Self {
        Self {
            instances_dir,
            versions,
            supervisor: ProcessSupervisor::default(),
        }
    }

    pub fn with_supervisor(mut self, supervisor: ProcessSupervisor) -> Self {
        self.supervisor = supervisor;
        self
    }

    pub fn versions(&self) -> &VersionManager {
        &self.versions
    }

    pub fn instance_path(&self, name: &str) -> PathBuf {
        self.instances_dir.join(name)
    }

    pub fn web_inf_path(&self, name: &str) -> PathBuf {
        self.instance_path(name).join(WEB_INF)
    }

    // ── Create / copy / link ────────────────────────────

    /// Create instance `name` from `version`, downloading it when needed.
    pub async fn create(&self, registry: &mut Registry, name: &str, version: &str) -> XToolResult<()> {
        validate_instance_name(name)?;
        if registry.has_instance(name) {
            return Err(XToolError::InstanceAlreadyExists(name.to_string()));
        }
        let instance_path = self.instance_path(name);
        if instance_path.exists() {
            warn!("Unregistered directory {:?} is in the way", instance_path);
            return Err(XToolError::InstanceAlreadyExists(name.to_string()));
        }

        self.versions.ensure_version(registry, version).await?;

        let version_path = self.versions.directory_path(version);
        let link = registry.preferences().link_instance_storage;
        let extensions = registry.preferences().linkable_file_extensions.clone();
        let algorithm = registry.preferences().checksum_algorithm;

        let target = instance_path.clone();
        let populated = tokio::task::spawn_blocking(move || -> XToolResult<()> {
            copy_tree(&version_path, &target)?;
            if link {
                let linked = link_identical_files(&target, &version_path, &extensions, algorithm)?;
                info!("Linked {} files to the version storage", linked);
            }
            Ok(())
        })
        .await
        .map_err(|e| XToolError::Other(format!("Instance creation task failed: {e}")))?;

        if let Err(e) = populated {
            remove_path(&instance_path)?;
            return Err(e);
        }

        registry.add_instance(InstanceRecord::new(name, version))?;
        registry.persist()?;
        info!("Instance {} created in {:?}", name, instance_path);
        Ok(())
    }

    /// Apply the link optimization to an existing instance.
    pub async fn link(&self, registry: &mut Registry, name: &str) -> XToolResult<usize> {
        let version = registry
            .find_instance(name)
            .map(|i| i.version.clone())
            .ok_or_else(|| XToolError::InstanceNotFound(name.to_string()))?;
        self.versions.ensure_version(registry, &version).await?;

        info!("Linking instance {} to reduce storage space", name);
        let linked = link_identical_files(
            &self.instance_path(name),
            &self.versions.directory_path(&version),
            &registry.preferences().linkable_file_extensions,
            registry.preferences().checksum_algorithm,
        )?;
        info!("Instance {}: {} files linked", name, linked);
        Ok(linked)
    }

    /// Copy instance `name` to `new_name`, bound to the same version.
    pub fn copy(&self, registry: &mut Registry, name: &str, new_name: &str) -> XToolResult<()> {
        let version = registry
            .find_instance(name)
            .map(|i| i.version.clone())
            .ok_or_else(|| XToolError::InstanceNotFound(name.to_string()))?;
        validate_instance_name(new_name)?;
        if registry.has_instance(new_name) || self.instance_path(new_name).exists() {
            return Err(XToolError::InstanceAlreadyExists(new_name.to_string()));
        }

        info!("Copying instance {} to {}", name, new_name);
        let target = self.instance_path(new_name);
        if let Err(e) = copy_tree(&self.instance_path(name), &target) {
            remove_path(&target)?;
            return Err(e);
        }

        registry.add_instance(InstanceRecord::new(new_name, &version))?;
        registry.persist()
    }

    // ── Edit ────────────────────────────────────────────

    /// Open `WEB-INF/<file>` of an instance in the configured editor and
    /// wait for it to exit.
    pub async fn edit(&self, registry: &Registry, name: &str, file: &str) -> XToolResult<()> {
        if !registry.has_instance(name) {
            return Err(XToolError::InstanceNotFound(name.to_string()));
        }

        let editor = resolve_editor(
            registry.preferences().editor.as_deref(),
            std::env::var("EDITOR").ok(),
        );
        let target = self.web_inf_path(name).join(file);

        let mut parts = editor.split_whitespace();
        let program = parts.next().unwrap_or(DEFAULT_EDITOR);
        debug!("Editing {:?} with {}", target, editor);

        let status = tokio::process::Command::new(program)
            .args(parts)
            .arg(&target)
            .status()
            .await
            .map_err(|e| XToolError::Process(format!("Cannot run editor {program}: {e}")))?;
        if !status.success() {
            warn!("Editor {} exited with {}", program, status);
        }
        Ok(())
    }

    // ── Start ───────────────────────────────────────────

    /// Start an instance, or a throwaway instance of a registered version,
    /// and supervise it until it stops or `interrupt` resolves.
    pub async fn start<F>(
        &self,
        registry: &mut Registry,
        entity: &str,
        options: StartOptions,
        interrupt: F,
    ) -> XToolResult<SupervisorOutcome>
    where
        F: Future<Output = ()>,
    {
        let debug_mode = options.debug || registry.preferences().debug;
        debug!("Instance debug mode: {}", debug_mode);

        if registry.has_instance(entity) {
            return self.run(entity, options.port, debug_mode, interrupt).await;
        }

        if !registry.has_version(entity) {
            return Err(XToolError::UnknownEntity(entity.to_string()));
        }

        let name = temporary_instance_name();
        info!("Starting version {} as instance {}", entity, name);
        self.create(registry, &name, entity).await?;

        let outcome = self.run(&name, options.port, debug_mode, interrupt).await;
        if options.temp {
            if let Err(e) = self.remove(registry, &name) {
                error!("Could not remove temporary instance {}: {}", name, e);
            }
        }
        outcome
    }

    async fn run<F>(
        &self,
        name: &str,
        port: Option<u16>,
        debug: bool,
        interrupt: F,
    ) -> XToolResult<SupervisorOutcome>
    where
        F: Future<Output = ()>,
    {
        let path = self.instance_path(name);
        if !path.is_dir() {
            return Err(XToolError::Process(format!(
                "Directory of instance {name} does not exist"
            )));
        }

        let child = spawn_instance(&path, port, debug)?;
        let outcome = self.supervisor.run(child, interrupt).await?;
        match outcome.status {
            Some(status) => debug!("Instance {} stopped: {}", name, status),
            None => error!("Failed to confirm instance {} stopped", name),
        }
        Ok(outcome)
    }

    // ── Remove ──────────────────────────────────────────

    pub fn remove(&self, registry: &mut Registry, name: &str) -> XToolResult<()> {
        if !registry.has_instance(name) {
            return Err(XToolError::InstanceNotFound(name.to_string()));
        }

        info!("Removing instance {}", name);
        remove_path(&self.instance_path(name))?;
        registry.remove_instance(name);
        registry.persist()
    }

    // ── Listing ─────────────────────────────────────────

    /// Instance names grouped by version, versions in version order.
    pub fn grouped_by_version(registry: &Registry) -> Vec<(String, Vec<String>)> {
        let mut instances: Vec<&InstanceRecord> = registry.instances().iter().collect();
        instances.sort_by(|a, b| compare_versions(&a.version, &b.version).then(a.name.cmp(&b.name)));

        let mut groups: Vec<(String, Vec<String>)> = Vec::new();
        for instance in instances {
            match groups.last_mut() {
                Some((version, names)) if *version == instance.version => {
                    names.push(instance.name.clone());
                }
                _ => groups.push((instance.version.clone(), vec![instance.name.clone()])),
            }
        }
        groups
    }
}

/// Editor preference, then `$EDITOR`, then [`DEFAULT_EDITOR`].
pub fn resolve_editor(preference: Option<&str>, env_editor: Option<String>) -> String {
    preference
        .map(str::to_string)
        .filter(|e| !e.trim().is_empty())
        .or_else(|| env_editor.filter(|e| !e.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_EDITOR.to_string())
}
