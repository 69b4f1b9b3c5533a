pub mod app_state;
pub mod paths;

pub use app_state::AppState;
pub use paths::AppPaths;
