// ─── xtool Core ───
// Local manager for XWiki distributions, instances and snapshots.
//
// Architecture:
//   core/
//     registry/   config.json model + persistence
//     version/    Version identifiers + download/extract/prune
//     maven/      Artifact coordinates, metadata, distribution naming
//     downloader/ Release/snapshot resolution + verified downloads
//     instance/   Instance CRUD, linking, upgrade
//     launch/     Start scripts + process supervision
//     snapshot/   Tree diffs + snapshot archives
//     state/      Data root layout + loaded application state

pub mod archive;
pub mod checksum;
pub mod downloader;
pub mod error;
pub mod http;
pub mod instance;
pub mod launch;
pub mod maven;
pub mod naming;
pub mod registry;
pub mod snapshot;
pub mod state;
pub mod tree;
pub mod version;
