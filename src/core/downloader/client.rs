use std::ffi::OsString;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::resolver::Resolver;
use crate::core::checksum::{self, ChecksumAlgorithm};
use crate::core::error::{XToolError, XToolResult};
use crate::core::maven::distribution_artifact;

/// Where the archive of a version and its published checksum live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadLocation {
    pub archive_url: String,
    pub checksum_url: String,
}

/// Checksum-verified downloader for distribution archives.
pub struct ArchiveDownloader {
    client: Client,
    repository_url: String,
    algorithm: ChecksumAlgorithm,
    show_progress: bool,
}

impl ArchiveDownloader {
    pub fn new(client: Client, repository_url: &str, algorithm: ChecksumAlgorithm) -> Self {
        Self {
            client,
            repository_url: repository_url.to_string(),
            algorithm,
            show_progress: false,
        }
    }

    /// Draw a progress bar on stderr while streaming.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    // ── Resolution ──────────────────────────────────────

    /// Resolve the archive URL of `version` and its checksum companion.
    ///
    /// Pre-release identifiers hit the network to read the snapshot metadata.
    pub async fn resolve_location(&self, version: &str) -> XToolResult<DownloadLocation> {
        let artifact = distribution_artifact(version);
        let resolver = Resolver::for_version(version, &self.repository_url);

        let folder = resolver.resolve_folder(&artifact);
        let file_name = resolver.resolve_file_name(&self.client, &artifact).await?;

        let archive_url = format!("{folder}/{file_name}");
        let checksum_url = format!("{archive_url}.{}", self.algorithm.extension());
        Ok(DownloadLocation {
            archive_url,
            checksum_url,
        })
    }

    // ── Download ────────────────────────────────────────

    /// Download the archive of `version` to `dest` and verify it.
    ///
    /// Returns `Ok(false)` when the repository has no such artifact or the
    /// content does not match the published checksum. No file is left at
    /// `dest` unless the download succeeded.
    pub async fn download(&self, version: &str, dest: &Path) -> XToolResult<bool> {
        let location = self.resolve_location(version).await?;

        let Some(expected) = self.fetch_checksum(&location.checksum_url).await else {
            info!(
                "No published {} checksum for version {} at {}",
                self.algorithm, version, location.checksum_url
            );
            return Ok(false);
        };

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| XToolError::io(parent, source))?;
        }

        let part = part_path(dest);
        if let Err(e) = self.stream_to(&location.archive_url, &part).await {
            remove_quietly(&part).await;
            return Err(e);
        }

        let algorithm = self.algorithm;
        let checked = {
            let part = part.clone();
            tokio::task::spawn_blocking(move || checksum::check(&part, &expected, algorithm))
                .await
                .map_err(|e| XToolError::Other(format!("Checksum task failed: {e}")))
        };
        match checked {
            Ok(Ok(())) => {}
            Ok(Err(e @ XToolError::ChecksumMismatch { .. })) => {
                warn!("{} ({}), discarding the download", e, algorithm);
                remove_quietly(&part).await;
                return Ok(false);
            }
            Ok(Err(e)) | Err(e) => {
                remove_quietly(&part).await;
                return Err(e);
            }
        }

        tokio::fs::rename(&part, dest)
            .await
            .map_err(|source| XToolError::io(dest, source))?;
        info!("Downloaded {} -> {:?}", location.archive_url, dest);
        Ok(true)
    }

    /// Published checksum, `None` when it cannot be fetched.
    async fn fetch_checksum(&self, url: &str) -> Option<String> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("Checksum probe {} failed: {}", url, e);
                return None;
            }
        };
        if !response.status().is_success() {
            debug!("Checksum probe {} returned HTTP {}", url, response.status());
            return None;
        }
        let body = response.text().await.ok()?;
        checksum::parse_published_checksum(&body)
    }

    async fn stream_to(&self, url: &str, part: &Path) -> XToolResult<()> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(XToolError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let pb = self.progress_bar(url, response.content_length());

        let mut file = tokio::fs::File::create(part)
            .await
            .map_err(|source| XToolError::io(part, source))?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|source| XToolError::io(part, source))?;
            pb.inc(chunk.len() as u64);
        }
        file.flush()
            .await
            .map_err(|source| XToolError::io(part, source))?;
        pb.finish_and_clear();

        debug!("Streamed {} -> {:?}", url, part);
        Ok(())
    }

    fn progress_bar(&self, url: &str, length: Option<u64>) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(length.unwrap_or(0));
        if let Ok(style) = ProgressStyle::with_template(
            "  {msg} [{bar:30}] {bytes}/{total_bytes} {bytes_per_sec} ETA {eta}",
        ) {
            pb.set_style(style);
        }
        let name = url.rsplit('/').next().unwrap_or(url);
        pb.set_message(name.to_string());
        pb
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove {:?}: {}", path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_file_sits_next_to_destination() {
        assert_eq!(
            part_path(Path::new("/data/versions/xwiki-9.5.zip")),
            PathBuf::from("/data/versions/xwiki-9.5.zip.part")
        );
    }

    #[tokio::test]
    async fn release_location_uses_checksum_extension() {
        let downloader = ArchiveDownloader::new(
            Client::new(),
            "https://maven.xwiki.org",
            ChecksumAlgorithm::Sha1,
        );
        let location = downloader.resolve_location("15.10.4").await.unwrap();
        assert_eq!(
            location.archive_url,
            "https://maven.xwiki.org/releases/org/xwiki/platform/\
             xwiki-platform-distribution-flavor-jetty-hsqldb/15.10.4/\
             xwiki-platform-distribution-flavor-jetty-hsqldb-15.10.4.zip"
        );
        assert_eq!(
            location.checksum_url,
            format!("{}.sha1", location.archive_url)
        );
    }
}
