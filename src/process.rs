// External process supervision
//
// The spawned microVM binary is the only concurrent entity the SDK owns. The
// handle offers a non-blocking liveness probe, signal delivery, and a
// blocking wait; the SDK never spawns background tasks to babysit it.

use std::path::Path;
use std::process::ExitStatus;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Handle to a spawned microVM process
#[derive(Debug)]
pub struct VmmProcess {
    child: Child,
    pid: u32,
    exit_status: Option<ExitStatus>,
}

impl VmmProcess {
    /// Spawn `binary` with `args`, stdio detached.
    pub fn spawn(binary: &Path, args: &[String]) -> Result<Self> {
        let mut command = Command::new(binary);
        command.args(args);
        command.stdin(std::process::Stdio::null());
        command.stdout(std::process::Stdio::null());
        command.stderr(std::process::Stdio::null());

        let child = command.spawn().map_err(|e| {
            Error::Startup(format!("failed to spawn {}: {e}", binary.display()))
        })?;
        let pid = child
            .id()
            .ok_or_else(|| Error::Startup("spawned process exited immediately".to_string()))?;

        info!(pid, binary = %binary.display(), "spawned microVM process");
        Ok(Self {
            child,
            pid,
            exit_status: None,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Exit status, once the process has been observed dead
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Exit code, mapping signal deaths to the shell convention (128 + signo).
    /// SIGTERM termination observes as 143.
    pub fn exit_code(&self) -> Option<i32> {
        use std::os::unix::process::ExitStatusExt;
        self.exit_status
            .and_then(|status| status.code().or_else(|| status.signal().map(|s| 128 + s)))
    }

    /// Non-blocking liveness probe. Reaps the exit status if the process has
    /// died since the last poll.
    pub fn is_alive(&mut self) -> bool {
        if self.exit_status.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!(pid = self.pid, ?status, "microVM process exited");
                self.exit_status = Some(status);
                false
            }
            Ok(None) => true,
            Err(_) => false,
        }
    }

    /// Deliver a signal. A process that is already gone is not an error.
    pub fn signal(&self, signal: Signal) -> Result<()> {
        if self.exit_status.is_some() {
            return Ok(());
        }
        match kill(Pid::from_raw(self.pid as i32), signal) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(Error::Transport(format!(
                "failed to signal pid {}: {e}",
                self.pid
            ))),
        }
    }

    /// Block until the process exits, reaping its status.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.exit_status {
            return Ok(status);
        }
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| Error::Transport(format!("failed to wait for pid {}: {e}", self.pid)))?;
        self.exit_status = Some(status);
        Ok(status)
    }
}
