use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use lifeline_core::config::CompanionConfig;
use lifeline_core::process::pid_alive;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Upper bound on reading a crashed companion's leftover output.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// The tracked companion. At most one exists per supervisor.
#[derive(Debug)]
pub(crate) struct CompanionHandle {
    pub(crate) pid: u32,
    pub(crate) child: Child,
}

pub(crate) type CompanionSlot = Arc<Mutex<Option<CompanionHandle>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Liveness {
    Alive,
    Dead,
}

impl CompanionHandle {
    /// Check whether the companion still exists.
    ///
    /// `try_wait` runs first so an exited child is reaped; otherwise its
    /// zombie entry would keep answering the pid probe.
    pub(crate) fn probe(&mut self) -> io::Result<Liveness> {
        if let Some(status) = self.child.try_wait()? {
            debug!(pid = self.pid, %status, "companion has exited");
            return Ok(Liveness::Dead);
        }
        if pid_alive(self.pid)? {
            Ok(Liveness::Alive)
        } else {
            Ok(Liveness::Dead)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("companion executable not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to spawn {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("spawned companion has no pid")]
    NoPid,
    #[error("companion pid {pid} exited immediately ({status})")]
    ExitedImmediately { pid: u32, status: ExitStatus },
    #[error("failed to verify companion pid {pid}: {source}")]
    Verify {
        pid: u32,
        #[source]
        source: io::Error,
    },
}

/// Spawn the companion in its own process group and verify it survives
/// the launch grace period.
pub(crate) async fn launch(
    companion: &CompanionConfig,
    grace: Duration,
) -> Result<CompanionHandle, LaunchError> {
    let path = companion.resolve_path();
    if !path.exists() {
        return Err(LaunchError::NotFound(path));
    }

    info!(path = %path.display(), args = ?companion.args, "launching companion");
    let mut cmd = Command::new(&path);
    cmd.args(&companion.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    // A fresh group keeps terminal signals aimed at us away from the companion.
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(|source| LaunchError::Spawn {
        path: path.clone(),
        source,
    })?;
    let pid = child.id().ok_or(LaunchError::NoPid)?;
    info!(pid, "companion spawned");

    tokio::time::sleep(grace).await;

    match child.try_wait() {
        Ok(None) => {}
        Ok(Some(status)) => {
            let (stdout, stderr) = drain_output(&mut child).await;
            error!(pid, %status, "companion terminated immediately");
            error!(pid, "companion stdout: {stdout}");
            error!(pid, "companion stderr: {stderr}");
            return Err(LaunchError::ExitedImmediately { pid, status });
        }
        Err(source) => {
            let _ = child.start_kill();
            return Err(LaunchError::Verify { pid, source });
        }
    }

    forward_output(pid, &mut child);
    Ok(CompanionHandle { pid, child })
}

/// Adopt an already running child as the companion.
pub(crate) fn adopt(child: Child) -> Option<CompanionHandle> {
    let pid = child.id()?;
    Some(CompanionHandle { pid, child })
}

async fn drain_output(child: &mut Child) -> (String, String) {
    let stdout = read_pipe(child.stdout.take()).await;
    let stderr = read_pipe(child.stderr.take()).await;
    (stdout, stderr)
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let Some(mut pipe) = pipe else {
        return String::new();
    };
    let mut buf = Vec::new();
    // Partial output is kept if a grandchild holds the pipe open.
    let _ = tokio::time::timeout(DRAIN_TIMEOUT, pipe.read_to_end(&mut buf)).await;
    String::from_utf8_lossy(&buf).trim().to_string()
}

/// Re-emit the companion's output as debug events without blocking on it.
fn forward_output(pid: u32, child: &mut Child) {
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_lines(pid, "stdout", stdout));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(pid, "stderr", stderr));
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(pid: u32, stream: &'static str, pipe: R) {
    let mut lines = BufReader::new(pipe).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => debug!(target: "lifeline::companion", pid, stream, "{line}"),
            Ok(None) => break,
            Err(e) => {
                debug!(target: "lifeline::companion", pid, stream, error = %e, "output stream closed");
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn companion(program: &str, args: &[&str]) -> CompanionConfig {
        CompanionConfig {
            base_dir: None,
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn missing_executable_fails_fast() {
        let cfg = CompanionConfig {
            base_dir: Some(PathBuf::from("/nonexistent-lifeline-dir")),
            program: "lifeline-heartbeat".into(),
            args: Vec::new(),
        };
        let err = launch(&cfg, Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, LaunchError::NotFound(_)));
    }

    #[tokio::test]
    async fn immediate_exit_is_a_launch_failure() {
        let cfg = companion("/bin/sh", &["-c", "echo boom >&2; exit 3"]);
        let err = launch(&cfg, Duration::from_millis(200)).await.unwrap_err();
        match err {
            LaunchError::ExitedImmediately { status, .. } => assert_eq!(status.code(), Some(3)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn long_running_companion_is_tracked() {
        let cfg = companion("/bin/sleep", &["30"]);
        let mut handle = launch(&cfg, Duration::from_millis(50)).await.expect("launch");
        assert_eq!(handle.probe().unwrap(), Liveness::Alive);

        handle.child.start_kill().expect("kill");
        handle.child.wait().await.expect("wait");
        assert_eq!(handle.probe().unwrap(), Liveness::Dead);
    }

    #[tokio::test]
    async fn companion_runs_in_its_own_process_group() {
        let cfg = companion("/bin/sleep", &["30"]);
        let mut handle = launch(&cfg, Duration::from_millis(50)).await.expect("launch");
        // SAFETY: getpgid only reads process metadata.
        let pgid = unsafe { libc::getpgid(handle.pid as libc::pid_t) };
        assert_eq!(pgid, handle.pid as libc::pid_t);

        handle.child.start_kill().expect("kill");
        handle.child.wait().await.expect("wait");
    }
}
