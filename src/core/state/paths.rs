use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::error::{XToolError, XToolResult};

const APP_DIR_NAME: &str = ".xtool";
const HOME_ENV: &str = "XTOOL_HOME";

/// Fixed on-disk layout under the data root.
///
/// ```text
/// <root>/
///   config/config.json
///   versions/    extracted distributions (and transient archives)
///   instances/   one directory per instance
///   snapshots/   delta archives
/// ```
#[derive(Debug, Clone)]
pub struct AppPaths {
    root: PathBuf,
}

impl AppPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Data root from an explicit override, then `XTOOL_HOME`, then `~/.xtool`.
    pub fn resolve(explicit: Option<PathBuf>) -> Self {
        let root = explicit
            .or_else(|| std::env::var_os(HOME_ENV).map(PathBuf::from))
            .unwrap_or_else(default_data_dir);
        Self::new(root)
    }

    /// Create every directory of the layout.
    pub fn ensure_layout(&self) -> XToolResult<()> {
        for dir in [
            self.config_dir(),
            self.versions_dir(),
            self.instances_dir(),
            self.snapshots_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|source| XToolError::io(&dir, source))?;
        }
        debug!("Data root ready at {:?}", self.root);
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    pub fn registry_file(&self) -> PathBuf {
        self.config_dir().join("config.json")
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    pub fn instances_dir(&self) -> PathBuf {
        self.root.join("instances")
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.root.join("snapshots")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}
