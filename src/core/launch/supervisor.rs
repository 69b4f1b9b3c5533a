use std::future::Future;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::core::error::{XToolError, XToolResult};

/// Delay between two liveness checks of the child.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Time granted to the child after a termination request before it is killed.
pub const GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Lifecycle of a supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Running,
    TerminateRequested,
    Killed,
    Exited,
}

/// How a supervised process ended.
#[derive(Debug)]
pub struct SupervisorOutcome {
    /// `Exited` or `Killed`.
    pub state: SupervisorState,
    /// Whether termination was requested by an interrupt.
    pub interrupted: bool,
    /// `None` when the end of the process could not be confirmed.
    pub status: Option<ExitStatus>,
}

/// Polls a child process while watching for an interrupt, then shuts it
/// down gracefully and, past the grace period, forcefully.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    poll_interval: Duration,
    grace_period: Duration,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            grace_period: GRACE_PERIOD,
        }
    }
}

impl ProcessSupervisor {
    pub fn new(poll_interval: Duration, grace_period: Duration) -> Self {
        Self {
            poll_interval,
            grace_period,
        }
    }

    /// Supervise `child` until it ends. `interrupt` resolving starts the
    /// shutdown sequence.
    pub async fn run<F>(&self, mut child: Child, interrupt: F) -> XToolResult<SupervisorOutcome>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(interrupt);

        let mut state = SupervisorState::Running;
        let mut interrupted = false;
        let mut exit_status = None;
        let mut deadline = Instant::now();
        let mut ticker = tokio::time::interval(self.poll_interval);

        loop {
            state = match state {
                SupervisorState::Running | SupervisorState::TerminateRequested => {
                    if let Some(status) = child
                        .try_wait()
                        .map_err(|e| XToolError::Process(format!("Cannot poll process: {e}")))?
                    {
                        debug!("Process exited with {}", status);
                        exit_status = Some(status);
                        SupervisorState::Exited
                    } else if state == SupervisorState::Running {
                        tokio::select! {
                            _ = ticker.tick() => SupervisorState::Running,
                            _ = &mut interrupt => {
                                info!("Interrupt received, stopping the process");
                                request_termination(&child).await;
                                interrupted = true;
                                deadline = Instant::now() + self.grace_period;
                                SupervisorState::TerminateRequested
                            }
                        }
                    } else if Instant::now() >= deadline {
                        warn!(
                            "Process still alive after {:?}, killing it",
                            self.grace_period
                        );
                        SupervisorState::Killed
                    } else {
                        ticker.tick().await;
                        SupervisorState::TerminateRequested
                    }
                }
                SupervisorState::Killed => return Ok(self.kill(child).await),
                SupervisorState::Exited => {
                    return Ok(SupervisorOutcome {
                        state,
                        interrupted,
                        status: exit_status,
                    })
                }
            };
        }
    }

    async fn kill(&self, mut child: Child) -> SupervisorOutcome {
        force_kill(&mut child).await;

        let status = match tokio::time::timeout(self.grace_period, child.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                error!("Could not confirm the process was killed: {}", e);
                None
            }
            Err(_) => {
                error!("Process did not terminate after being killed");
                None
            }
        };

        SupervisorOutcome {
            state: SupervisorState::Killed,
            interrupted: true,
            status,
        }
    }
}

#[cfg(not(target_os = "windows"))]
async fn request_termination(child: &Child) {
    let Some(pid) = child.id() else {
        return;
    };
    match tokio::process::Command::new("kill")
        .args(["-15", &pid.to_string()])
        .status()
        .await
    {
        Ok(status) if status.success() => debug!("SIGTERM sent to {}", pid),
        Ok(status) => warn!("kill -15 {} returned {:?}", pid, status.code()),
        Err(e) => warn!("Could not send SIGTERM to {}: {}", pid, e),
    }
}

#[cfg(target_os = "windows")]
async fn request_termination(child: &Child) {
    let Some(pid) = child.id() else {
        return;
    };
    match tokio::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T"])
        .status()
        .await
    {
        Ok(status) if status.success() => debug!("Termination requested for {}", pid),
        Ok(status) => warn!("taskkill {} returned {:?}", pid, status.code()),
        Err(e) => warn!("Could not request termination of {}: {}", pid, e),
    }
}

#[cfg(not(target_os = "windows"))]
async fn force_kill(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!("Could not kill process: {}", e);
    }
}

#[cfg(target_os = "windows")]
async fn force_kill(child: &mut Child) {
    if let Some(pid) = child.id() {
        let _ = tokio::process::Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T", "/F"])
            .status()
            .await;
    }
    if let Err(e) = child.start_kill() {
        debug!("start_kill after taskkill: {}", e);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::process::Command;

    fn fast() -> ProcessSupervisor {
        ProcessSupervisor::new(Duration::from_millis(20), Duration::from_millis(300))
    }

    #[tokio::test]
    async fn natural_exit_is_reported() {
        let child = Command::new("true").spawn().unwrap();
        let outcome = fast().run(child, std::future::pending()).await.unwrap();
        assert_eq!(outcome.state, SupervisorState::Exited);
        assert!(!outcome.interrupted);
        assert!(outcome.status.unwrap().success());
    }

    #[tokio::test]
    async fn interrupt_terminates_gracefully() {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let interrupt = tokio::time::sleep(Duration::from_millis(100));
        let outcome = fast().run(child, interrupt).await.unwrap();
        assert_eq!(outcome.state, SupervisorState::Exited);
        assert!(outcome.interrupted);
        assert!(!outcome.status.unwrap().success());
    }

    #[tokio::test]
    async fn ignored_termination_ends_in_kill() {
        let child = Command::new("sh")
            .args(["-c", "trap '' TERM; while true; do sleep 1; done"])
            .spawn()
            .unwrap();
        let interrupt = tokio::time::sleep(Duration::from_millis(100));
        let outcome = fast().run(child, interrupt).await.unwrap();
        assert_eq!(outcome.state, SupervisorState::Killed);
        assert!(outcome.status.is_some());
    }
}
