pub mod client;
pub mod resolver;

pub use client::{ArchiveDownloader, DownloadLocation};
pub use resolver::{ArtifactResolver, ReleaseResolver, Resolver, SnapshotResolver};
