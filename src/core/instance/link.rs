use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::core::checksum::{compute_digest, ChecksumAlgorithm};
use crate::core::error::{XToolError, XToolResult};

/// Replace files of `instance_dir` whose extension is linkable and whose
/// content is identical to the file at the same relative path in
/// `version_dir` by a link to that file.
///
/// Symbolic links are used on unix, hard links elsewhere. Returns the number
/// of files linked.
pub fn link_identical_files(
    instance_dir: &Path,
    version_dir: &Path,
    extensions: &[String],
    algorithm: ChecksumAlgorithm,
) -> XToolResult<usize> {
    let version_dir =
        std::fs::canonicalize(version_dir).map_err(|e| XToolError::io(version_dir, e))?;
    let mut linked = 0;

    for entry in WalkDir::new(instance_dir).follow_links(false) {
        let entry = entry.map_err(|e| XToolError::io(instance_dir, e.into()))?;
        if !entry.file_type().is_file() || !is_linkable(entry.path(), extensions) {
            continue;
        }

        let path = entry.path();
        let Ok(relative) = path.strip_prefix(instance_dir) else {
            continue;
        };
        let reference = version_dir.join(relative);
        if !reference.is_file() || !same_content(path, &reference, algorithm)? {
            continue;
        }

        std::fs::remove_file(path).map_err(|e| XToolError::io(path, e))?;
        link_file(&reference, path)?;
        debug!("Linked {:?} -> {:?}", path, reference);
        linked += 1;
    }

    Ok(linked)
}

fn is_linkable(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    extensions
        .iter()
        .any(|candidate| candidate.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

fn same_content(a: &Path, b: &Path, algorithm: ChecksumAlgorithm) -> XToolResult<bool> {
    let len_a = std::fs::metadata(a).map_err(|e| XToolError::io(a, e))?.len();
    let len_b = std::fs::metadata(b).map_err(|e| XToolError::io(b, e))?.len();
    if len_a != len_b {
        return Ok(false);
    }
    Ok(compute_digest(a, algorithm)? == compute_digest(b, algorithm)?)
}

#[cfg(unix)]
fn link_file(target: &Path, link: &Path) -> XToolResult<()> {
    std::os::unix::fs::symlink(target, link).map_err(|e| XToolError::io(link, e))
}

#[cfg(not(unix))]
fn link_file(target: &Path, link: &Path) -> XToolResult<()> {
    std::fs::hard_link(target, link).map_err(|e| XToolError::io(link, e))
}
