//! Graceful-then-forceful child termination.
//!
//! A child is asked to exit with `SIGTERM` and given `graceful_timeout` to
//! comply; survivors are killed and given `forceful_timeout` more. Neither
//! wait is ever unbounded, and a process that still cannot be confirmed dead
//! is logged and treated as gone.

use std::time::Duration;

use lifeline_core::config::TimingConfig;
use lifeline_core::process::request_terminate;
use tokio::process::Child;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationPolicy {
    pub graceful_timeout: Duration,
    pub forceful_timeout: Duration,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self {
            graceful_timeout: Duration::from_secs(5),
            forceful_timeout: Duration::from_secs(2),
        }
    }
}

impl TerminationPolicy {
    pub fn from_timing(timing: &TimingConfig) -> Self {
        Self {
            graceful_timeout: timing.graceful_timeout(),
            forceful_timeout: timing.forceful_timeout(),
        }
    }

    /// Worst-case time `terminate_child` can spend waiting.
    pub fn max_wait(&self) -> Duration {
        self.graceful_timeout + self.forceful_timeout
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// The process had exited before we asked.
    AlreadyExited,
    /// Exited within the graceful window.
    Graceful,
    /// Exited after being killed.
    Forced,
    /// Could not confirm the process died.
    Unconfirmed,
}

/// Terminate one child according to `policy`.
pub async fn terminate_child(child: &mut Child, policy: &TerminationPolicy) -> TerminationOutcome {
    match child.try_wait() {
        Ok(Some(status)) => {
            debug!(%status, "process already exited");
            return TerminationOutcome::AlreadyExited;
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "could not poll process before termination"),
    }

    let pid = child.id();
    info!(?pid, "terminating process");

    let signalled = match pid.map(request_terminate) {
        Some(Ok(true)) => true,
        Some(Ok(false)) => {
            // Gone from the process table between the poll and the signal.
            match tokio::time::timeout(policy.forceful_timeout, child.wait()).await {
                Ok(Ok(status)) => debug!(?pid, %status, "process exited before termination"),
                Ok(Err(e)) => warn!(?pid, error = %e, "failed to reap exited process"),
                Err(_) => warn!(?pid, "timed out reaping exited process"),
            }
            return TerminationOutcome::AlreadyExited;
        }
        Some(Err(e)) => {
            warn!(?pid, error = %e, "graceful termination request failed");
            false
        }
        None => false,
    };

    if signalled {
        match tokio::time::timeout(policy.graceful_timeout, child.wait()).await {
            Ok(Ok(status)) => {
                info!(?pid, %status, "process terminated gracefully");
                return TerminationOutcome::Graceful;
            }
            Ok(Err(e)) => warn!(?pid, error = %e, "failed waiting for graceful exit"),
            Err(_) => warn!(
                ?pid,
                timeout_ms = policy.graceful_timeout.as_millis() as u64,
                "graceful termination timed out, force killing"
            ),
        }
    }

    if let Err(e) = child.start_kill() {
        warn!(?pid, error = %e, "kill request failed");
    }
    match tokio::time::timeout(policy.forceful_timeout, child.wait()).await {
        Ok(Ok(status)) => {
            info!(?pid, %status, "process force killed");
            TerminationOutcome::Forced
        }
        Ok(Err(e)) => {
            error!(?pid, error = %e, "failed to kill process");
            TerminationOutcome::Unconfirmed
        }
        Err(_) => {
            error!(?pid, "failed to kill process: still running after forced termination");
            TerminationOutcome::Unconfirmed
        }
    }
}

/// Apply [`terminate_child`] to every child in turn.
///
/// Used for externally tracked helpers (tool-provider subprocesses and the
/// like) that share the companion's termination policy.
pub async fn terminate_process_list(
    children: &mut [Child],
    policy: &TerminationPolicy,
) -> Vec<TerminationOutcome> {
    let mut outcomes = Vec::with_capacity(children.len());
    for child in children.iter_mut() {
        outcomes.push(terminate_child(child, policy).await);
    }
    if !outcomes.is_empty() {
        info!(count = outcomes.len(), "process list cleanup completed");
    }
    outcomes
}
