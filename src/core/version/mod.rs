pub mod identifier;
pub mod manager;

pub use identifier::{compare_versions, is_prerelease, XWikiVersion};
pub use manager::{VersionManager, START_SCRIPTS};
