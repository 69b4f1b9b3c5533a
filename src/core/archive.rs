// ─── Archives ───
// Extraction of distribution zips and creation/unpacking of snapshot
// archives in the supported formats.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

use crate::core::error::{XToolError, XToolResult};

/// Archive format of a snapshot.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    #[default]
    Zip,
    Tar,
    Gztar,
}

impl ArchiveFormat {
    /// File extension including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => ".zip",
            ArchiveFormat::Tar => ".tar",
            ArchiveFormat::Gztar => ".tar.gz",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveFormat::Zip => write!(f, "zip"),
            ArchiveFormat::Tar => write!(f, "tar"),
            ArchiveFormat::Gztar => write!(f, "gztar"),
        }
    }
}

impl FromStr for ArchiveFormat {
    type Err = XToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zip" => Ok(ArchiveFormat::Zip),
            "tar" => Ok(ArchiveFormat::Tar),
            "gztar" | "tar.gz" | "tgz" => Ok(ArchiveFormat::Gztar),
            other => Err(XToolError::Other(format!("Unsupported archive format: {other}"))),
        }
    }
}

/// Extract a zip archive into `destination`, dropping the archive's top-level
/// directory so its content lands directly in `destination`.
///
/// Unix permissions recorded in the archive are restored.
pub fn extract_zip_stripped(zip_path: &Path, destination: &Path) -> XToolResult<()> {
    let zip_file = File::open(zip_path).map_err(|source| XToolError::io(zip_path, source))?;
    let mut archive = zip::ZipArchive::new(BufReader::new(zip_file))?;
    extract_zip_entries(&mut archive, destination, true)
}

fn extract_zip_entries<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    destination: &Path,
    strip_top_level: bool,
) -> XToolResult<()> {
    create_dir(destination)?;

    for index in 0..archive.len() {
        let mut zipped = archive.by_index(index)?;

        let enclosed_name = zipped
            .enclosed_name()
            .ok_or_else(|| XToolError::Other(format!("Invalid zip entry path: {}", zipped.name())))?;
        let mut rel_path = PathBuf::new();
        let mut components = enclosed_name.components();
        if strip_top_level {
            let _ = components.next();
        }
        for component in components {
            if let Component::Normal(part) = component {
                rel_path.push(part);
            }
        }

        if rel_path.as_os_str().is_empty() {
            continue;
        }

        let out_path = destination.join(rel_path);
        if zipped.is_dir() {
            create_dir(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            create_dir(parent)?;
        }
        detach(&out_path)?;

        let mut out = File::create(&out_path).map_err(|source| XToolError::io(&out_path, source))?;
        std::io::copy(&mut zipped, &mut out).map_err(|source| XToolError::io(&out_path, source))?;

        #[cfg(unix)]
        if let Some(mode) = zipped.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode & 0o7777))
                .map_err(|source| XToolError::io(&out_path, source))?;
        }
    }

    Ok(())
}

fn unpack_tar<R: Read>(mut archive: tar::Archive<R>, destination: &Path) -> XToolResult<()> {
    archive.set_preserve_permissions(true);
    let entries = archive
        .entries()
        .map_err(|source| XToolError::io(destination, source))?;

    for entry in entries {
        let mut entry = entry.map_err(|source| XToolError::io(destination, source))?;
        let rel_path = entry
            .path()
            .map_err(|source| XToolError::io(destination, source))?
            .into_owned();
        if !entry.header().entry_type().is_dir() {
            detach(&destination.join(&rel_path))?;
        }
        entry
            .unpack_in(destination)
            .map_err(|source| XToolError::io(destination.join(&rel_path), source))?;
    }

    Ok(())
}

/// Remove an existing non-directory entry so that a write replaces it instead
/// of going through a symbolic or hard link into shared files.
fn detach(path: &Path) -> XToolResult<()> {
    match std::fs::symlink_metadata(path) {
        Ok(metadata) if !metadata.is_dir() => {
            std::fs::remove_file(path).map_err(|source| XToolError::io(path, source))
        }
        _ => Ok(()),
    }
}

/// Archive the content of `source_dir` (not the directory itself) into `dest`.
pub fn create_archive(source_dir: &Path, dest: &Path, format: ArchiveFormat) -> XToolResult<()> {
    debug!("Archiving {:?} as {} into {:?}", source_dir, format, dest);
    if let Some(parent) = dest.parent() {
        create_dir(parent)?;
    }
    let file = File::create(dest).map_err(|source| XToolError::io(dest, source))?;

    match format {
        ArchiveFormat::Zip => write_zip(source_dir, file),
        ArchiveFormat::Tar => write_tar(source_dir, BufWriter::new(file)).map(|_| ()),
        ArchiveFormat::Gztar => {
            let encoder = write_tar(
                source_dir,
                GzEncoder::new(BufWriter::new(file), Compression::default()),
            )?;
            encoder
                .finish()
                .map_err(|source| XToolError::io(dest, source))?;
            Ok(())
        }
    }
}

/// Unpack an archive on top of `destination`, overwriting existing files.
pub fn unpack_archive(archive_path: &Path, destination: &Path, format: ArchiveFormat) -> XToolResult<()> {
    debug!("Unpacking {:?} ({}) into {:?}", archive_path, format, destination);
    let file = File::open(archive_path).map_err(|source| XToolError::io(archive_path, source))?;
    create_dir(destination)?;

    match format {
        ArchiveFormat::Zip => {
            let mut archive = zip::ZipArchive::new(BufReader::new(file))?;
            extract_zip_entries(&mut archive, destination, false)
        }
        ArchiveFormat::Tar => unpack_tar(tar::Archive::new(BufReader::new(file)), destination),
        ArchiveFormat::Gztar => unpack_tar(
            tar::Archive::new(GzDecoder::new(BufReader::new(file))),
            destination,
        ),
    }
}

fn write_zip(source_dir: &Path, file: File) -> XToolResult<()> {
    let mut writer = zip::ZipWriter::new(BufWriter::new(file));

    for entry in sorted_entries(source_dir) {
        let entry = entry.map_err(|e| XToolError::io(source_dir, e.into()))?;
        let path = entry.path();
        let Some(name) = archive_name(source_dir, path) else {
            continue;
        };

        let metadata = std::fs::metadata(path).map_err(|source| XToolError::io(path, source))?;
        let options = SimpleFileOptions::default().unix_permissions(file_mode(&metadata));

        if metadata.is_dir() {
            writer.add_directory(name, options)?;
        } else {
            writer.start_file(name, options)?;
            let mut input = File::open(path).map_err(|source| XToolError::io(path, source))?;
            std::io::copy(&mut input, &mut writer).map_err(|source| XToolError::io(path, source))?;
        }
    }

    writer.finish()?;
    Ok(())
}

fn write_tar<W: std::io::Write>(source_dir: &Path, out: W) -> XToolResult<W> {
    let mut builder = tar::Builder::new(out);
    // Linked instance files are stored with their content.
    builder.follow_symlinks(true);

    for entry in sorted_entries(source_dir) {
        let entry = entry.map_err(|e| XToolError::io(source_dir, e.into()))?;
        let path = entry.path();
        let Some(name) = archive_name(source_dir, path) else {
            continue;
        };

        if path.is_dir() {
            builder
                .append_dir(&name, path)
                .map_err(|source| XToolError::io(path, source))?;
        } else {
            builder
                .append_path_with_name(path, &name)
                .map_err(|source| XToolError::io(path, source))?;
        }
    }

    builder
        .into_inner()
        .map_err(|source| XToolError::io(source_dir, source))
}

fn sorted_entries(root: &Path) -> walkdir::IntoIter {
    WalkDir::new(root)
        .follow_links(true)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        .into_iter()
}

/// `/`-separated path of `path` relative to `root`; `None` for the root itself.
fn archive_name(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    if rel.as_os_str().is_empty() {
        return None;
    }
    Some(
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
    )
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    if metadata.is_dir() {
        0o755
    } else {
        0o644
    }
}

fn create_dir(path: &Path) -> XToolResult<()> {
    std::fs::create_dir_all(path).map_err(|source| XToolError::io(path, source))
}
