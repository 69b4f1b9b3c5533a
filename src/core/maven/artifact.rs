use serde::{Deserialize, Serialize};
use std::fmt;

/// A Maven coordinate for a downloadable distribution artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MavenArtifact {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    /// File extension / packaging type (`zip` for distributions).
    pub packaging: String,
}

impl MavenArtifact {
    pub fn new(group_id: &str, artifact_id: &str, version: &str, packaging: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
            packaging: packaging.to_string(),
        }
    }

    /// Construct the group path portion (`org/xwiki/platform`).
    pub fn group_path(&self) -> String {
        self.group_id.replace('.', "/")
    }

    /// `artifactId-version`, also the name of the archive's top-level directory.
    pub fn base_name(&self) -> String {
        format!("{}-{}", self.artifact_id, self.version)
    }

    /// `artifactId-version.packaging`
    pub fn filename(&self) -> String {
        format!("{}.{}", self.base_name(), self.packaging)
    }

    /// File name of a timestamped snapshot build (`artifactId-<build>.packaging`).
    pub fn build_filename(&self, build: &str) -> String {
        format!("{}-{}.{}", self.artifact_id, build, self.packaging)
    }

    /// Folder holding every file of this version under the given repository root.
    ///
    /// Template:
    /// `<repo>/<group_path>/<artifact_id>/<version>`
    pub fn folder_url(&self, repo_base: &str) -> String {
        let base = repo_base.trim_end_matches('/');
        format!(
            "{}/{}/{}/{}",
            base,
            self.group_path(),
            self.artifact_id,
            self.version
        )
    }

    /// Construct the full URL for the release file of this artifact.
    pub fn url(&self, repo_base: &str) -> String {
        format!("{}/{}", self.folder_url(repo_base), self.filename())
    }
}

impl fmt::Display for MavenArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}@{}",
            self.group_id, self.artifact_id, self.version, self.packaging
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform(version: &str) -> MavenArtifact {
        MavenArtifact::new(
            "org.xwiki.platform",
            "xwiki-platform-distribution-flavor-jetty-hsqldb",
            version,
            "zip",
        )
    }

    #[test]
    fn url_construction() {
        let a = platform("15.10.4");
        assert_eq!(
            a.url("https://maven.xwiki.org/releases/"),
            "https://maven.xwiki.org/releases/org/xwiki/platform/\
             xwiki-platform-distribution-flavor-jetty-hsqldb/15.10.4/\
             xwiki-platform-distribution-flavor-jetty-hsqldb-15.10.4.zip"
        );
    }

    #[test]
    fn build_filename_uses_timestamp() {
        let a = platform("16.0.0-SNAPSHOT");
        assert_eq!(
            a.build_filename("16.0.0-20240105.101010-7"),
            "xwiki-platform-distribution-flavor-jetty-hsqldb-16.0.0-20240105.101010-7.zip"
        );
    }

    #[test]
    fn display_coordinate() {
        assert_eq!(
            platform("9.5").to_string(),
            "org.xwiki.platform:xwiki-platform-distribution-flavor-jetty-hsqldb:9.5@zip"
        );
    }
}
