use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::core::archive::ArchiveFormat;
use crate::core::checksum::ChecksumAlgorithm;
use crate::core::error::{XToolError, XToolResult};
use crate::core::maven::XWIKI_REPOSITORY;

/// A named instance bound to the version it was created from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceRecord {
    pub name: String,
    pub version: String,
}

impl InstanceRecord {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
        }
    }
}

/// A stored delta between an instance and its reference version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct SnapshotRecord {
    pub name: String,
    pub instance_name: String,
    pub version: String,
    #[serde(deserialize_with = "deserialize_date")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub format: ArchiveFormat,
    /// `/`-separated paths relative to the instance root.
    #[serde(default)]
    pub removed_elements: Vec<String>,
}

impl SnapshotRecord {
    /// File name of the delta archive under `snapshots/`.
    pub fn archive_file_name(&self) -> String {
        format!("{}{}", self.name, self.format.extension())
    }
}

/// Read a snapshot date: RFC 3339, or a naive `YYYY-MM-DD HH:MM:SS[.ffffff]`
/// timestamp taken as local time.
pub fn parse_snapshot_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw.trim(), format).ok())
        .and_then(|naive| naive.and_local_timezone(Local).earliest())
        .map(|date| date.with_timezone(&Utc))
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_snapshot_date(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized date {raw:?}")))
}

/// User preferences.
///
/// Missing keys take their default on load; unknown keys are dropped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct Preferences {
    /// Editor used by `edit`; falls back to `$EDITOR`.
    pub editor: Option<String>,
    /// Always start instances with the debug script.
    pub debug: bool,
    pub snapshot_format: ArchiveFormat,
    /// Replace identical files of new instances with links into the version.
    #[serde(alias = "linkInstanceStorage")]
    pub link_instance_storage: bool,
    #[serde(alias = "linkableFileExtensions")]
    pub linkable_file_extensions: Vec<String>,
    pub repository_url: String,
    pub checksum_algorithm: ChecksumAlgorithm,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            editor: None,
            debug: false,
            snapshot_format: ArchiveFormat::Zip,
            link_instance_storage: false,
            linkable_file_extensions: vec!["jar".to_string()],
            repository_url: XWIKI_REPOSITORY.to_string(),
            checksum_algorithm: ChecksumAlgorithm::Md5,
        }
    }
}

/// Every preference name accepted by `get`/`set`.
pub const PREFERENCE_KEYS: &[&str] = &[
    "editor",
    "debug",
    "snapshot-format",
    "link-instance-storage",
    "linkable-file-extensions",
    "repository-url",
    "checksum-algorithm",
];

impl Preferences {
    /// Current value of a preference, `None` for an unknown name.
    pub fn get(&self, key: &str) -> Option<Value> {
        if !PREFERENCE_KEYS.contains(&key) {
            return None;
        }
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => map.remove(key),
            _ => None,
        }
    }

    /// Set one preference, validating the value's shape.
    ///
    /// `self` is left untouched when the key or the value is rejected.
    pub fn set(&mut self, key: &str, value: Value) -> XToolResult<()> {
        if !PREFERENCE_KEYS.contains(&key) {
            return Err(XToolError::PreferenceRejected(key.to_string()));
        }

        let mut map = match serde_json::to_value(&*self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        map.insert(key.to_string(), value);

        let updated: Preferences =
            serde_json::from_value(Value::Object(map)).map_err(|e| XToolError::InvalidPreference {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        *self = updated;
        Ok(())
    }
}

/// The whole registry document as stored in `config/config.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryDocument {
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default)]
    pub instances: Vec<InstanceRecord>,
    #[serde(default)]
    pub snapshots: Vec<SnapshotRecord>,
    #[serde(default)]
    pub preferences: Preferences,
    /// Top-level keys written by other tools, carried over untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// Snapshot entries that could not be read (e.g. an archive format this
    /// tool cannot unpack). Written back as they were.
    #[serde(skip)]
    pub unreadable_snapshots: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_preferences_take_defaults() {
        let prefs: Preferences = serde_json::from_value(json!({ "debug": true })).unwrap();
        assert!(prefs.debug);
        assert_eq!(prefs.snapshot_format, ArchiveFormat::Zip);
        assert_eq!(prefs.linkable_file_extensions, vec!["jar".to_string()]);
        assert_eq!(prefs.repository_url, "https://maven.xwiki.org");
    }

    #[test]
    fn get_known_and_unknown_keys() {
        let prefs = Preferences::default();
        assert_eq!(prefs.get("snapshot-format"), Some(json!("zip")));
        assert_eq!(prefs.get("editor"), Some(Value::Null));
        assert_eq!(prefs.get("colour"), None);
    }

    #[test]
    fn set_validates_shape() {
        let mut prefs = Preferences::default();
        prefs.set("snapshot-format", json!("gztar")).unwrap();
        assert_eq!(prefs.snapshot_format, ArchiveFormat::Gztar);

        let err = prefs.set("debug", json!("yes")).unwrap_err();
        assert!(matches!(err, XToolError::InvalidPreference { .. }));
        assert!(!prefs.debug);

        let err = prefs.set("colour", json!("blue")).unwrap_err();
        assert!(matches!(err, XToolError::PreferenceRejected(_)));
    }

    #[test]
    fn document_keeps_unknown_top_level_keys() {
        let doc: RegistryDocument = serde_json::from_value(json!({
            "versions": ["9.5"],
            "owner": "ops"
        }))
        .unwrap();
        assert_eq!(doc.versions, vec!["9.5".to_string()]);
        assert_eq!(doc.extra.get("owner"), Some(&json!("ops")));

        let back = serde_json::to_value(&doc).unwrap();
        assert_eq!(back["owner"], json!("ops"));
        assert_eq!(back["instances"], json!([]));
    }

    #[test]
    fn snapshot_dates_accept_naive_timestamps() {
        let utc = parse_snapshot_date("2024-01-05T10:10:10Z").unwrap();
        assert_eq!(utc.to_rfc3339(), "2024-01-05T10:10:10+00:00");

        let expected = NaiveDateTime::parse_from_str("2024-01-05 10:10:10.123456", "%Y-%m-%d %H:%M:%S%.f")
            .unwrap();
        let naive = parse_snapshot_date("2024-01-05 10:10:10.123456").unwrap();
        assert_eq!(naive.with_timezone(&Local).naive_local(), expected);
        assert!(parse_snapshot_date("2024-01-05 10:10:10").is_some());
        assert!(parse_snapshot_date("yesterday").is_none());
    }

    #[test]
    fn link_preferences_accept_camel_case_names() {
        let prefs: Preferences = serde_json::from_value(json!({
            "linkInstanceStorage": true,
            "linkableFileExtensions": ["jar", "xar"]
        }))
        .unwrap();
        assert!(prefs.link_instance_storage);
        assert_eq!(prefs.linkable_file_extensions, vec!["jar".to_string(), "xar".to_string()]);
        assert_eq!(serde_json::to_value(&prefs).unwrap()["link-instance-storage"], json!(true));
    }

    #[test]
    fn snapshot_record_uses_kebab_case_keys() {
        let record: SnapshotRecord = serde_json::from_value(json!({
            "name": "dev-0a1b2c3d",
            "instance-name": "dev",
            "version": "15.10",
            "date": "2024-01-05T10:10:10Z",
            "format": "tar",
            "removed-elements": ["data/old.txt"]
        }))
        .unwrap();
        assert_eq!(record.instance_name, "dev");
        assert_eq!(record.archive_file_name(), "dev-0a1b2c3d.tar");
    }
}
