use quick_xml::de::from_str;
use serde::Deserialize;

use crate::core::error::{XToolError, XToolResult};

/// `maven-metadata.xml` of a snapshot version folder – only the fields
/// needed to find the latest timestamped build.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MavenMetadata {
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub artifact_id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub versioning: Option<Versioning>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Versioning {
    #[serde(default)]
    pub snapshot: Option<SnapshotInfo>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub snapshot_versions: Option<SnapshotVersions>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub build_number: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SnapshotVersions {
    #[serde(default, rename = "snapshotVersion")]
    pub items: Vec<SnapshotVersion>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct SnapshotVersion {
    #[serde(default)]
    pub classifier: Option<String>,
    pub extension: String,
    pub value: String,
    #[serde(default)]
    pub updated: Option<String>,
}

impl MavenMetadata {
    pub fn parse(xml: &str) -> XToolResult<Self> {
        Ok(from_str(xml)?)
    }

    /// Resolve the timestamped build identifier (e.g. `16.0.0-20240105.101010-7`)
    /// of the unclassified artifact with the given extension.
    ///
    /// Prefers the explicit `snapshotVersions` list; older metadata only carries
    /// `snapshot/timestamp` + `snapshot/buildNumber`.
    pub fn snapshot_build(&self, base_version: &str, extension: &str) -> Option<String> {
        let versioning = self.versioning.as_ref()?;

        let listed = versioning
            .snapshot_versions
            .as_ref()
            .and_then(|versions| {
                versions
                    .items
                    .iter()
                    .filter(|v| v.extension == extension && v.classifier.is_none())
                    .max_by(|a, b| a.updated.cmp(&b.updated))
            })
            .map(|v| v.value.clone());
        if listed.is_some() {
            return listed;
        }

        let snapshot = versioning.snapshot.as_ref()?;
        let timestamp = snapshot.timestamp.as_deref()?;
        let build_number = snapshot.build_number?;
        let release = base_version.trim_end_matches("-SNAPSHOT");
        Some(format!("{release}-{timestamp}-{build_number}"))
    }
}

/// Parse metadata fetched from `url`, mapping every failure to `MetadataFetch`.
pub fn parse_snapshot_metadata(url: &str, xml: &str) -> XToolResult<MavenMetadata> {
    MavenMetadata::parse(xml).map_err(|e| XToolError::MetadataFetch {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
    <metadata modelVersion="1.1.0">
      <groupId>org.xwiki.platform</groupId>
      <artifactId>xwiki-platform-distribution-flavor-jetty-hsqldb</artifactId>
      <version>16.0.0-SNAPSHOT</version>
      <versioning>
        <snapshot>
          <timestamp>20240105.101010</timestamp>
          <buildNumber>7</buildNumber>
        </snapshot>
        <lastUpdated>20240105101010</lastUpdated>
        <snapshotVersions>
          <snapshotVersion>
            <extension>pom</extension>
            <value>16.0.0-20240105.101010-7</value>
            <updated>20240105101010</updated>
          </snapshotVersion>
          <snapshotVersion>
            <extension>zip</extension>
            <value>16.0.0-20240105.101010-7</value>
            <updated>20240105101010</updated>
          </snapshotVersion>
        </snapshotVersions>
      </versioning>
    </metadata>
    "#;

    #[test]
    fn resolves_listed_zip_build() {
        let metadata = MavenMetadata::parse(METADATA).unwrap();
        assert_eq!(metadata.version.as_deref(), Some("16.0.0-SNAPSHOT"));
        assert_eq!(
            metadata.snapshot_build("16.0.0-SNAPSHOT", "zip").as_deref(),
            Some("16.0.0-20240105.101010-7")
        );
    }

    #[test]
    fn falls_back_to_timestamp_and_build_number() {
        let xml = r#"
        <metadata>
          <versioning>
            <snapshot>
              <timestamp>20231201.080000</timestamp>
              <buildNumber>3</buildNumber>
            </snapshot>
          </versioning>
        </metadata>"#;
        let metadata = MavenMetadata::parse(xml).unwrap();
        assert_eq!(
            metadata.snapshot_build("15.10-SNAPSHOT", "zip").as_deref(),
            Some("15.10-20231201.080000-3")
        );
    }

    #[test]
    fn missing_versioning_resolves_nothing() {
        let metadata = MavenMetadata::parse("<metadata><version>1.0</version></metadata>").unwrap();
        assert!(metadata.snapshot_build("1.0-SNAPSHOT", "zip").is_none());
    }

    #[test]
    fn malformed_xml_is_a_metadata_error() {
        let err = parse_snapshot_metadata("http://repo/maven-metadata.xml", "<metadata><versioning>")
            .unwrap_err();
        assert!(matches!(err, XToolError::MetadataFetch { .. }));
    }
}
