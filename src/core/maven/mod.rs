mod artifact;
mod distribution;
mod metadata;

pub use artifact::MavenArtifact;
pub use distribution::{
    distribution_artifact, NamingScheme, RepositoryCategory, MIGRATION_VERSION,
};
pub use metadata::{parse_snapshot_metadata, MavenMetadata};

/// Public XWiki Maven repository.
pub const XWIKI_REPOSITORY: &str = "https://maven.xwiki.org";

/// File name of the per-version snapshot metadata descriptor.
pub const METADATA_FILE: &str = "maven-metadata.xml";
