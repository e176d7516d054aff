//! Process-tree isolation and termination
//!
//! Commands start as their own process group (POSIX) or process-group root
//! (Windows) so a timeout can kill every descendant, not just the shell.

use tokio::process::{Child, Command};
#[cfg(windows)]
use tracing::debug;
use tracing::warn;

/// Start the command in a fresh process group
#[cfg(unix)]
pub fn isolate(cmd: &mut Command) {
    cmd.process_group(0);
}

#[cfg(windows)]
pub fn isolate(cmd: &mut Command) {
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
pub fn isolate(_cmd: &mut Command) {}

/// Forcefully kill the child and all of its descendants.
///
/// Does not reap; callers still `wait()` for the final status.
#[cfg(unix)]
pub async fn kill_tree(child: &mut Child) {
    let Some(pid) = child.id() else {
        return; // already reaped
    };

    kill_group(pid).await;
    if let Err(e) = child.start_kill() {
        warn!(pid, error = %e, "failed to kill child process");
    }
}

/// Kill every process left in the group led by `pid`.
///
/// Works after the leader itself has been reaped, as long as any member of
/// the group is still alive.
#[cfg(unix)]
pub async fn kill_group(pid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let pgid = Pid::from_raw(-(pid as i32));
    if let Err(e) = signal::kill(pgid, Signal::SIGKILL) {
        if e != Errno::ESRCH {
            warn!(pid, error = ?e, "SIGKILL to process group failed");
        }
    }
}

#[cfg(windows)]
pub async fn kill_tree(child: &mut Child) {
    if let Some(pid) = child.id() {
        kill_group(pid).await;
    }
    let _ = child.start_kill();
}

#[cfg(windows)]
pub async fn kill_group(pid: u32) {
    use std::process::Stdio;

    let status = Command::new("taskkill")
        .args(["/T", "/F", "/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match status {
        Ok(status) if status.success() => {}
        Ok(status) => debug!(pid, ?status, "taskkill reported failure"),
        Err(e) => warn!(pid, error = %e, "failed to run taskkill"),
    }
}

#[cfg(not(any(unix, windows)))]
pub async fn kill_tree(child: &mut Child) {
    let _ = child.start_kill();
}

#[cfg(not(any(unix, windows)))]
pub async fn kill_group(_pid: u32) {}
