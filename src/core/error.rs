use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the whole manager.
/// Every module returns `Result<T, XToolError>`.
#[derive(Debug, Error)]
pub enum XToolError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Cannot resolve snapshot metadata at {url}: {reason}")]
    MetadataFetch { url: String, reason: String },

    // ── Integrity ───────────────────────────────────────
    #[error("Checksum mismatch for {path:?}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // ── Serialization ───────────────────────────────────
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Versions ────────────────────────────────────────
    #[error("Invalid version identifier: {0}")]
    InvalidVersion(String),

    #[error("Version not found: {0}")]
    VersionNotFound(String),

    #[error("Version {0} could not be downloaded")]
    VersionUnavailable(String),

    // ── Instances ───────────────────────────────────────
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Instance already exists: {0}")]
    InstanceAlreadyExists(String),

    #[error("Invalid instance name: {0:?}")]
    InvalidName(String),

    #[error("No instance or version named {0}")]
    UnknownEntity(String),

    #[error("Not upgrading instance {instance}: {reason}")]
    UpgradeRejected { instance: String, reason: String },

    #[error("Process error: {0}")]
    Process(String),

    // ── Snapshots ───────────────────────────────────────
    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    // ── Preferences ─────────────────────────────────────
    #[error("Unknown preference: {0}")]
    PreferenceRejected(String),

    #[error("Invalid value for preference {key}: {reason}")]
    InvalidPreference { key: String, reason: String },

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type XToolResult<T> = Result<T, XToolError>;

impl XToolError {
    /// Wrap an IO error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        XToolError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<std::io::Error> for XToolError {
    fn from(source: std::io::Error) -> Self {
        XToolError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}
