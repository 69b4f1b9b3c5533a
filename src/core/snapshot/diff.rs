// ─── Directory diff ───
// Asymmetric comparison of an instance against its reference version:
// what the instance lost, and what it added or changed.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::core::error::{XToolError, XToolResult};
use crate::core::tree::copy_tree;

/// Result of [`diff_trees`]. Paths are `/`-separated and relative to the
/// compared roots.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TreeDiff {
    /// Present in the reference, absent from the instance.
    pub removed: Vec<String>,
    /// Added to the instance or different from the reference. Directories
    /// listed here are new as a whole.
    pub changed: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    File,
    Dir,
}

/// Compare `instance` against `reference`.
///
/// An entry whose kind differs (file in one tree, directory in the other) is
/// listed both as removed and as changed.
pub fn diff_trees(reference: &Path, instance: &Path) -> XToolResult<TreeDiff> {
    let mut diff = TreeDiff::default();
    diff_dir(reference, instance, "", &mut diff)?;
    Ok(diff)
}

fn diff_dir(reference: &Path, instance: &Path, prefix: &str, diff: &mut TreeDiff) -> XToolResult<()> {
    let reference_entries = list(reference)?;
    let instance_entries = list(instance)?;

    for (name, kind) in &reference_entries {
        let rel = join(prefix, name);
        match instance_entries.get(name) {
            None => diff.removed.push(rel),
            Some(other) if other != kind => {
                diff.removed.push(rel.clone());
                diff.changed.push(rel);
            }
            Some(Kind::Dir) => diff_dir(&reference.join(name), &instance.join(name), &rel, diff)?,
            Some(Kind::File) => {
                if !same_content(&reference.join(name), &instance.join(name))? {
                    diff.changed.push(rel);
                }
            }
        }
    }

    for name in instance_entries.keys() {
        if !reference_entries.contains_key(name) {
            diff.changed.push(join(prefix, name));
        }
    }

    Ok(())
}

/// Entries of a directory by name, links resolved to what they point at.
fn list(dir: &Path) -> XToolResult<BTreeMap<String, Kind>> {
    let mut entries = BTreeMap::new();
    let read = std::fs::read_dir(dir).map_err(|e| XToolError::io(dir, e))?;
    for entry in read {
        let entry = entry.map_err(|e| XToolError::io(dir, e))?;
        let path = entry.path();
        let metadata = std::fs::metadata(&path).map_err(|e| XToolError::io(&path, e))?;
        let kind = if metadata.is_dir() { Kind::Dir } else { Kind::File };
        entries.insert(entry.file_name().to_string_lossy().to_string(), kind);
    }
    Ok(entries)
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

fn same_content(a: &Path, b: &Path) -> XToolResult<bool> {
    // Linked instance files resolve to the reference file itself.
    if let (Ok(ca), Ok(cb)) = (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        if ca == cb {
            return Ok(true);
        }
    }

    let len_a = std::fs::metadata(a).map_err(|e| XToolError::io(a, e))?.len();
    let len_b = std::fs::metadata(b).map_err(|e| XToolError::io(b, e))?.len();
    if len_a != len_b {
        return Ok(false);
    }

    let mut ra = BufReader::new(File::open(a).map_err(|e| XToolError::io(a, e))?);
    let mut rb = BufReader::new(File::open(b).map_err(|e| XToolError::io(b, e))?);
    loop {
        let ba = ra.fill_buf().map_err(|e| XToolError::io(a, e))?;
        let bb = rb.fill_buf().map_err(|e| XToolError::io(b, e))?;
        if ba.is_empty() || bb.is_empty() {
            return Ok(ba.is_empty() && bb.is_empty());
        }
        let n = ba.len().min(bb.len());
        if ba[..n] != bb[..n] {
            return Ok(false);
        }
        ra.consume(n);
        rb.consume(n);
    }
}

/// Copy every changed entry of `instance` into `staging`, keeping relative
/// paths. Linked files are copied with their content.
pub fn stage_changes(instance: &Path, changed: &[String], staging: &Path) -> XToolResult<()> {
    for rel in changed {
        let source = instance.join(rel);
        let target = staging.join(rel);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| XToolError::io(parent, e))?;
        }

        if std::fs::metadata(&source)
            .map_err(|e| XToolError::io(&source, e))?
            .is_dir()
        {
            copy_tree(&source, &target)?;
        } else {
            std::fs::copy(&source, &target).map_err(|e| XToolError::io(&source, e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn classifies_removed_changed_and_added_entries() {
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("ref");
        let instance = dir.path().join("inst");
        for root in [&reference, &instance] {
            fs::create_dir_all(root.join("conf")).unwrap();
            fs::write(root.join("A.txt"), "same").unwrap();
            fs::write(root.join("conf/B.cfg"), "original").unwrap();
        }
        fs::write(reference.join("D.txt"), "deleted later").unwrap();
        fs::create_dir_all(reference.join("gone/inner")).unwrap();
        fs::write(instance.join("conf/B.cfg"), "modified").unwrap();
        fs::write(instance.join("C.txt"), "added").unwrap();
        fs::create_dir_all(instance.join("newdir")).unwrap();

        let diff = diff_trees(&reference, &instance).unwrap();
        assert_eq!(diff.removed, vec!["D.txt".to_string(), "gone".to_string()]);
        assert_eq!(
            diff.changed,
            vec!["conf/B.cfg".to_string(), "C.txt".to_string(), "newdir".to_string()]
        );
    }

    #[test]
    fn kind_change_is_both_removed_and_changed() {
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("ref");
        let instance = dir.path().join("inst");
        fs::create_dir_all(reference.join("logs")).unwrap();
        fs::create_dir_all(&instance).unwrap();
        fs::write(instance.join("logs"), "now a file").unwrap();

        let diff = diff_trees(&reference, &instance).unwrap();
        assert_eq!(diff.removed, vec!["logs".to_string()]);
        assert_eq!(diff.changed, vec!["logs".to_string()]);
    }

    #[test]
    fn same_size_different_bytes_is_a_change() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, "abcd").unwrap();
        fs::write(&b, "abce").unwrap();
        assert!(!same_content(&a, &b).unwrap());
        fs::write(&b, "abcd").unwrap();
        assert!(same_content(&a, &b).unwrap());
    }

    #[test]
    fn staging_mirrors_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let instance = dir.path().join("inst");
        fs::create_dir_all(instance.join("conf")).unwrap();
        fs::create_dir_all(instance.join("newdir/sub")).unwrap();
        fs::write(instance.join("conf/B.cfg"), "modified").unwrap();
        fs::write(instance.join("newdir/sub/x"), "x").unwrap();

        let staging = dir.path().join("staging");
        stage_changes(
            &instance,
            &["conf/B.cfg".to_string(), "newdir".to_string()],
            &staging,
        )
        .unwrap();
        assert_eq!(fs::read_to_string(staging.join("conf/B.cfg")).unwrap(), "modified");
        assert_eq!(fs::read_to_string(staging.join("newdir/sub/x")).unwrap(), "x");
    }
}
