// ─── Distribution naming ───
// XWiki moved its jetty/hsqldb distribution from the enterprise group to
// the platform group in 9.5; older releases keep their legacy coordinates.

use super::artifact::MavenArtifact;
use crate::core::version::identifier::{is_prerelease, XWikiVersion};

/// First version published under the platform coordinates.
pub const MIGRATION_VERSION: &str = "9.5";

const PLATFORM_GROUP: &str = "org.xwiki.platform";
const PLATFORM_ARTIFACT: &str = "xwiki-platform-distribution-flavor-jetty-hsqldb";
const ENTERPRISE_GROUP: &str = "org.xwiki.enterprise";
const ENTERPRISE_ARTIFACT: &str = "xwiki-enterprise-jetty-hsqldb";
const DISTRIBUTION_PACKAGING: &str = "zip";

/// Artifact naming scheme in effect for a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingScheme {
    /// `org.xwiki.platform:xwiki-platform-distribution-flavor-jetty-hsqldb`
    Platform,
    /// `org.xwiki.enterprise:xwiki-enterprise-jetty-hsqldb`
    Enterprise,
}

impl NamingScheme {
    /// Pre-release identifiers always use the platform scheme; they are not
    /// reliably comparable with the migration boundary. Identifiers that do not
    /// parse are treated the same way.
    pub fn for_version(version: &str) -> Self {
        if is_prerelease(version) {
            return NamingScheme::Platform;
        }

        match (
            XWikiVersion::parse(version),
            XWikiVersion::parse(MIGRATION_VERSION),
        ) {
            (Ok(v), Ok(boundary)) if v < boundary => NamingScheme::Enterprise,
            _ => NamingScheme::Platform,
        }
    }
}

/// Repository category of a version (`releases` or `snapshots`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryCategory {
    Releases,
    Snapshots,
}

impl RepositoryCategory {
    pub fn for_version(version: &str) -> Self {
        if is_prerelease(version) {
            RepositoryCategory::Snapshots
        } else {
            RepositoryCategory::Releases
        }
    }

    pub fn path_segment(&self) -> &'static str {
        match self {
            RepositoryCategory::Releases => "releases",
            RepositoryCategory::Snapshots => "snapshots",
        }
    }

    /// Root of this category under the repository base URL.
    pub fn root(&self, repository_url: &str) -> String {
        format!(
            "{}/{}",
            repository_url.trim_end_matches('/'),
            self.path_segment()
        )
    }
}

/// Maven coordinate of the distribution archive of `version`.
pub fn distribution_artifact(version: &str) -> MavenArtifact {
    let (group, artifact) = match NamingScheme::for_version(version) {
        NamingScheme::Platform => (PLATFORM_GROUP, PLATFORM_ARTIFACT),
        NamingScheme::Enterprise => (ENTERPRISE_GROUP, ENTERPRISE_ARTIFACT),
    };
    MavenArtifact::new(group, artifact, version, DISTRIBUTION_PACKAGING)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_boundary_uses_legacy_scheme() {
        assert_eq!(NamingScheme::for_version("9.4"), NamingScheme::Enterprise);
        assert_eq!(NamingScheme::for_version("8.4.5"), NamingScheme::Enterprise);
        assert_eq!(
            distribution_artifact("9.4").base_name(),
            "xwiki-enterprise-jetty-hsqldb-9.4"
        );
    }

    #[test]
    fn boundary_and_above_use_platform_scheme() {
        assert_eq!(NamingScheme::for_version("9.5"), NamingScheme::Platform);
        assert_eq!(NamingScheme::for_version("9.11"), NamingScheme::Platform);
        assert_eq!(NamingScheme::for_version("15.10.4"), NamingScheme::Platform);
        assert_eq!(
            distribution_artifact("15.10.4").filename(),
            "xwiki-platform-distribution-flavor-jetty-hsqldb-15.10.4.zip"
        );
    }

    #[test]
    fn prerelease_always_uses_platform_scheme() {
        // Numerically below the boundary, but still a pre-release.
        assert_eq!(
            NamingScheme::for_version("9.4-SNAPSHOT"),
            NamingScheme::Platform
        );
        assert_eq!(
            distribution_artifact("9.4-SNAPSHOT").group_id,
            "org.xwiki.platform"
        );
    }

    #[test]
    fn category_follows_snapshot_suffix() {
        assert_eq!(
            RepositoryCategory::for_version("16.0.0-SNAPSHOT").root("https://maven.xwiki.org/"),
            "https://maven.xwiki.org/snapshots"
        );
        assert_eq!(
            RepositoryCategory::for_version("16.0.0").path_segment(),
            "releases"
        );
    }
}
