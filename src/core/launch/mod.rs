pub mod script;
pub mod supervisor;

pub use script::{spawn_instance, start_command, start_script};
pub use supervisor::{
    ProcessSupervisor, SupervisorOutcome, SupervisorState, GRACE_PERIOD, POLL_INTERVAL,
};
