// ─── Checksums ───
// Streaming digests for downloaded artifacts, matching the companion
// checksum files the Maven repository publishes next to each archive.

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::core::error::{XToolError, XToolResult};

const CHUNK_SIZE: usize = 8192;

/// Digest algorithm used to verify archives.
///
/// MD5 is what the XWiki repository has always published; it is kept for
/// artifact compatibility. SHA-1 and SHA-256 are available when the
/// repository serves the matching companion file.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    #[default]
    Md5,
    Sha1,
    Sha256,
}

impl ChecksumAlgorithm {
    /// Suffix of the companion checksum file (`archive.zip.<ext>`).
    pub fn extension(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Md5 => "md5",
            ChecksumAlgorithm::Sha1 => "sha1",
            ChecksumAlgorithm::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = XToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(ChecksumAlgorithm::Md5),
            "sha1" => Ok(ChecksumAlgorithm::Sha1),
            "sha256" => Ok(ChecksumAlgorithm::Sha256),
            other => Err(XToolError::Other(format!(
                "Unsupported checksum algorithm: {other}"
            ))),
        }
    }
}

/// Compute the lowercase hex digest of a file, reading it in fixed-size chunks.
pub fn compute_digest(path: &Path, algorithm: ChecksumAlgorithm) -> XToolResult<String> {
    let file = std::fs::File::open(path).map_err(|source| XToolError::io(path, source))?;

    let digest = match algorithm {
        ChecksumAlgorithm::Md5 => stream_digest::<Md5>(file),
        ChecksumAlgorithm::Sha1 => stream_digest::<Sha1>(file),
        ChecksumAlgorithm::Sha256 => stream_digest::<Sha256>(file),
    };

    digest.map_err(|source| XToolError::io(path, source))
}

/// Compare a file against a published checksum.
pub fn verify(path: &Path, expected: &str, algorithm: ChecksumAlgorithm) -> XToolResult<bool> {
    match check(path, expected, algorithm) {
        Ok(()) => Ok(true),
        Err(XToolError::ChecksumMismatch { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Like [`verify`], reporting a mismatch as [`XToolError::ChecksumMismatch`].
pub fn check(path: &Path, published: &str, algorithm: ChecksumAlgorithm) -> XToolResult<()> {
    let expected = parse_published_checksum(published).unwrap_or_default();
    let actual = compute_digest(path, algorithm)?;
    if actual == expected {
        Ok(())
    } else {
        Err(XToolError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected,
            actual,
        })
    }
}

/// Extract the digest from the body of a published checksum file.
///
/// Repositories serve either the bare digest or `<digest>  <file name>`.
pub fn parse_published_checksum(body: &str) -> Option<String> {
    body.split_whitespace()
        .next()
        .map(|token| token.to_ascii_lowercase())
}

fn stream_digest<D: Digest>(mut reader: impl Read) -> std::io::Result<String> {
    let mut hasher = D::new();
    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
