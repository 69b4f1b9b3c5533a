pub mod model;
pub mod store;

pub use model::{InstanceRecord, Preferences, RegistryDocument, SnapshotRecord, PREFERENCE_KEYS};
pub use store::Registry;
