use std::path::{Path, PathBuf};

use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::core::error::{XToolError, XToolResult};

#[cfg(not(target_os = "windows"))]
const SCRIPT_EXTENSION: &str = "sh";
#[cfg(target_os = "windows")]
const SCRIPT_EXTENSION: &str = "bat";

/// Start script of a distribution, in its debug flavour when requested.
pub fn start_script(instance_dir: &Path, debug: bool) -> PathBuf {
    let stem = if debug {
        "start_xwiki_debug"
    } else {
        "start_xwiki"
    };
    instance_dir.join(format!("{stem}.{SCRIPT_EXTENSION}"))
}

/// Build the command running the start script from the instance directory.
pub fn start_command(instance_dir: &Path, port: Option<u16>, debug: bool) -> Command {
    let script = start_script(instance_dir, debug);

    let mut cmd = platform_command(&script);
    if let Some(port) = port {
        cmd.args(["-p", &port.to_string()]);
    }
    cmd.current_dir(instance_dir);
    cmd
}

/// Spawn the start script of an instance.
pub fn spawn_instance(instance_dir: &Path, port: Option<u16>, debug: bool) -> XToolResult<Child> {
    let script = start_script(instance_dir, debug);
    if !script.is_file() {
        return Err(XToolError::Process(format!(
            "Start script not found: {}",
            script.display()
        )));
    }

    let mut cmd = start_command(instance_dir, port, debug);
    info!("Starting {:?}", script);
    debug!("Command: {:?}", cmd);

    cmd.spawn()
        .map_err(|e| XToolError::Process(format!("Cannot run {}: {e}", script.display())))
}

#[cfg(not(target_os = "windows"))]
fn platform_command(script: &Path) -> Command {
    Command::new(script)
}

#[cfg(target_os = "windows")]
fn platform_command(script: &Path) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(script);
    cmd
}
