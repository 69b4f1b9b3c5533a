pub mod link;
pub mod manager;
pub mod upgrade;

pub use manager::{resolve_editor, InstanceManager, StartOptions, DEFAULT_EDITOR, WEB_INF};
pub use upgrade::{ConfigResolution, UpgradeReport, CONFIG_FILES};
