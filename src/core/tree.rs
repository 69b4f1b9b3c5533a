// ─── Directory trees ───
// Recursive copy/removal helpers shared by versions, instances and snapshots.

use std::path::Path;

use crate::core::error::{XToolError, XToolResult};

/// Copy `source` into `destination` recursively.
///
/// Symbolic links are recreated as links (pointing at the same target)
/// instead of being followed.
pub fn copy_tree(source: &Path, destination: &Path) -> XToolResult<()> {
    std::fs::create_dir_all(destination).map_err(|e| XToolError::io(destination, e))?;

    let entries = std::fs::read_dir(source).map_err(|e| XToolError::io(source, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| XToolError::io(source, e))?;
        let src_path = entry.path();
        let dst_path = destination.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| XToolError::io(&src_path, e))?;

        if file_type.is_symlink() {
            copy_link(&src_path, &dst_path)?;
        } else if file_type.is_dir() {
            copy_tree(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path).map_err(|e| XToolError::io(&src_path, e))?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_link(source: &Path, destination: &Path) -> XToolResult<()> {
    let target = std::fs::read_link(source).map_err(|e| XToolError::io(source, e))?;
    std::os::unix::fs::symlink(&target, destination).map_err(|e| XToolError::io(destination, e))
}

#[cfg(not(unix))]
fn copy_link(source: &Path, destination: &Path) -> XToolResult<()> {
    std::fs::copy(source, destination)
        .map(|_| ())
        .map_err(|e| XToolError::io(source, e))
}

/// Remove a file, link or directory tree. A missing path is not an error.
pub fn remove_path(path: &Path) -> XToolResult<()> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(XToolError::io(path, e)),
    };

    if metadata.is_dir() {
        std::fs::remove_dir_all(path).map_err(|e| XToolError::io(path, e))
    } else {
        std::fs::remove_file(path).map_err(|e| XToolError::io(path, e))
    }
}

/// Mark a file executable (`0o755`). No-op on non-unix systems and for
/// missing files.
pub fn make_executable(path: &Path) -> XToolResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if path.exists() {
            let mut perms = std::fs::metadata(path)
                .map_err(|e| XToolError::io(path, e))?
                .permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(path, perms).map_err(|e| XToolError::io(path, e))?;
        }
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn copy_tree_copies_nested_content() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("a/b")).unwrap();
        fs::write(src.join("a/b/file.txt"), "hello").unwrap();
        fs::create_dir_all(src.join("empty")).unwrap();

        let dst = dir.path().join("dst");
        copy_tree(&src, &dst).unwrap();
        assert_eq!(fs::read_to_string(dst.join("a/b/file.txt")).unwrap(), "hello");
        assert!(dst.join("empty").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn copy_tree_preserves_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let shared = dir.path().join("shared.jar");
        fs::write(&shared, "jar").unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        std::os::unix::fs::symlink(&shared, src.join("lib.jar")).unwrap();

        let dst = dir.path().join("dst");
        copy_tree(&src, &dst).unwrap();
        assert_eq!(fs::read_link(dst.join("lib.jar")).unwrap(), shared);
    }

    #[test]
    fn remove_path_handles_files_dirs_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        fs::write(&file, "x").unwrap();
        let tree = dir.path().join("tree/inner");
        fs::create_dir_all(&tree).unwrap();

        remove_path(&file).unwrap();
        remove_path(&dir.path().join("tree")).unwrap();
        remove_path(&dir.path().join("missing")).unwrap();
        assert!(!file.exists());
        assert!(!dir.path().join("tree").exists());
    }
}
