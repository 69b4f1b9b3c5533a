use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::core::error::{XToolError, XToolResult};
use crate::core::maven::{
    parse_snapshot_metadata, MavenArtifact, RepositoryCategory, METADATA_FILE,
};

/// How the archive of an artifact is located inside its version folder.
#[async_trait]
pub trait ArtifactResolver: Send + Sync {
    /// URL of the folder holding every file of the artifact's version.
    fn resolve_folder(&self, artifact: &MavenArtifact) -> String;

    /// Name of the archive inside [`ArtifactResolver::resolve_folder`].
    async fn resolve_file_name(
        &self,
        client: &Client,
        artifact: &MavenArtifact,
    ) -> XToolResult<String>;
}

/// Released versions: the archive name is derived from the coordinate.
pub struct ReleaseResolver {
    root: String,
}

impl ReleaseResolver {
    pub fn new(repository_url: &str) -> Self {
        Self {
            root: RepositoryCategory::Releases.root(repository_url),
        }
    }
}

#[async_trait]
impl ArtifactResolver for ReleaseResolver {
    fn resolve_folder(&self, artifact: &MavenArtifact) -> String {
        artifact.folder_url(&self.root)
    }

    async fn resolve_file_name(
        &self,
        _client: &Client,
        artifact: &MavenArtifact,
    ) -> XToolResult<String> {
        Ok(artifact.filename())
    }
}

/// `-SNAPSHOT` versions: the latest timestamped build is read from the
/// folder's `maven-metadata.xml`.
pub struct SnapshotResolver {
    root: String,
}

impl SnapshotResolver {
    pub fn new(repository_url: &str) -> Self {
        Self {
            root: RepositoryCategory::Snapshots.root(repository_url),
        }
    }
}

#[async_trait]
impl ArtifactResolver for SnapshotResolver {
    fn resolve_folder(&self, artifact: &MavenArtifact) -> String {
        artifact.folder_url(&self.root)
    }

    async fn resolve_file_name(
        &self,
        client: &Client,
        artifact: &MavenArtifact,
    ) -> XToolResult<String> {
        let url = format!("{}/{}", self.resolve_folder(artifact), METADATA_FILE);
        debug!("Fetching snapshot metadata {}", url);

        let fetch_error = |reason: String| XToolError::MetadataFetch {
            url: url.clone(),
            reason,
        };

        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fetch_error(format!("HTTP {}", response.status().as_u16())));
        }
        let body = response
            .text()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let metadata = parse_snapshot_metadata(&url, &body)?;
        let build = metadata
            .snapshot_build(&artifact.version, &artifact.packaging)
            .ok_or_else(|| fetch_error(format!("no {} build listed", artifact.packaging)))?;

        Ok(artifact.build_filename(&build))
    }
}

/// Resolution strategy picked from the version identifier.
pub enum Resolver {
    Release(ReleaseResolver),
    Snapshot(SnapshotResolver),
}

impl Resolver {
    pub fn for_version(version: &str, repository_url: &str) -> Self {
        match RepositoryCategory::for_version(version) {
            RepositoryCategory::Releases => Self::Release(ReleaseResolver::new(repository_url)),
            RepositoryCategory::Snapshots => Self::Snapshot(SnapshotResolver::new(repository_url)),
        }
    }

    pub fn resolve_folder(&self, artifact: &MavenArtifact) -> String {
        match self {
            Resolver::Release(r) => r.resolve_folder(artifact),
            Resolver::Snapshot(r) => r.resolve_folder(artifact),
        }
    }

    pub async fn resolve_file_name(
        &self,
        client: &Client,
        artifact: &MavenArtifact,
    ) -> XToolResult<String> {
        match self {
            Resolver::Release(r) => r.resolve_file_name(client, artifact).await,
            Resolver::Snapshot(r) => r.resolve_file_name(client, artifact).await,
        }
    }
}
