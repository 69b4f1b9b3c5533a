pub mod diff;
pub mod manager;

pub use diff::{diff_trees, stage_changes, TreeDiff};
pub use manager::SnapshotManager;
