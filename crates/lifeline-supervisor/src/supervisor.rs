use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lifeline_core::config::{CompanionConfig, Config, TimingConfig};
use lifeline_core::state::StateStore;
use serde::{Deserialize, Serialize};
use tokio::process::Child;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::launcher::{self, CompanionSlot, Liveness};
use crate::monitor::LivenessMonitor;
use crate::orchestrator::{ExitHook, ShutdownOrchestrator};
use crate::terminate::{terminate_child, terminate_process_list, TerminationOutcome, TerminationPolicy};

/// Extra work run by [`Supervisor::cleanup_all`] between stopping the
/// companion and writing the stopped status.
pub type CleanupFn = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanionState {
    /// No companion is tracked.
    NotStarted,
    /// The tracked companion is alive.
    Running,
    /// The tracked pid is no longer in the process table.
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionStatus {
    pub status: CompanionState,
    pub companion_pid: Option<u32>,
}

/// Owns the companion process, its liveness monitor and the shutdown
/// sequence. Construct one per host process and share it by cloning.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

struct Inner {
    companion_config: CompanionConfig,
    timing: TimingConfig,
    policy: TerminationPolicy,
    companion: CompanionSlot,
    /// Serialises launches and stops so two callers never race a spawn.
    lifecycle: Mutex<()>,
    monitor: LivenessMonitor,
    orchestrator: Arc<ShutdownOrchestrator>,
    state: StateStore,
    cleaned_up: AtomicBool,
}

impl Supervisor {
    /// Supervisor whose forced-exit fallback terminates the process.
    pub fn new(config: &Config) -> Self {
        let orchestrator = ShutdownOrchestrator::with_process_exit(config.timing.force_exit_delay());
        Self::with_orchestrator(config, orchestrator)
    }

    /// Supervisor that calls `exit_hook` instead of terminating the process.
    pub fn with_exit_hook(config: &Config, exit_hook: ExitHook) -> Self {
        let orchestrator = ShutdownOrchestrator::new(config.timing.force_exit_delay(), exit_hook);
        Self::with_orchestrator(config, orchestrator)
    }

    fn with_orchestrator(config: &Config, orchestrator: ShutdownOrchestrator) -> Self {
        Self {
            inner: Arc::new(Inner {
                companion_config: config.companion.clone(),
                timing: config.timing.clone(),
                policy: TerminationPolicy::from_timing(&config.timing),
                companion: Arc::new(Mutex::new(None)),
                lifecycle: Mutex::new(()),
                monitor: LivenessMonitor::default(),
                orchestrator: Arc::new(orchestrator),
                state: StateStore::from_config(&config.state),
                cleaned_up: AtomicBool::new(false),
            }),
        }
    }

    /// Record files written at startup and updated by [`cleanup_all`](Self::cleanup_all).
    pub fn state(&self) -> &StateStore {
        &self.inner.state
    }

    pub fn orchestrator(&self) -> &ShutdownOrchestrator {
        &self.inner.orchestrator
    }

    pub fn termination_policy(&self) -> TerminationPolicy {
        self.inner.policy
    }

    /// Launch the companion and start monitoring it.
    ///
    /// Returns the tracked pid without spawning if a live companion is
    /// already tracked. A tracked companion that has died is dropped and
    /// replaced. Returns `None` if the executable is missing or the process
    /// dies within the launch grace period.
    pub async fn start(&self) -> Option<u32> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        if let Some(pid) = self.live_tracked_pid().await {
            debug!(pid, "companion already tracked");
            return Some(pid);
        }

        match launcher::launch(&self.inner.companion_config, self.inner.timing.launch_grace()).await {
            Ok(handle) => {
                let pid = handle.pid;
                *self.inner.companion.lock().await = Some(handle);
                self.arm_monitor();
                info!(pid, "companion started");
                Some(pid)
            }
            Err(e) => {
                error!(error = %e, "failed to start companion");
                None
            }
        }
    }

    /// Track an externally spawned process as the companion and monitor it.
    ///
    /// Ignored (returning the existing pid) if a companion is already tracked.
    pub async fn register_companion(&self, child: Child) -> Option<u32> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        if let Some(pid) = self.live_tracked_pid().await {
            warn!(pid, "companion already tracked, ignoring registration");
            return Some(pid);
        }
        let Some(handle) = launcher::adopt(child) else {
            error!("cannot register a companion that has already been reaped");
            return None;
        };
        let pid = handle.pid;
        *self.inner.companion.lock().await = Some(handle);
        self.arm_monitor();
        info!(pid, "companion registered");
        Some(pid)
    }

    /// Stop monitoring and terminate the companion, bounded by the
    /// graceful and forceful timeouts. Always leaves nothing tracked.
    pub async fn stop(&self) {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.inner.monitor.stop();

        let handle = self.inner.companion.lock().await.take();
        let Some(mut handle) = handle else {
            debug!("no companion to stop");
            return;
        };
        info!(pid = handle.pid, "stopping companion");
        let outcome = terminate_child(&mut handle.child, &self.inner.policy).await;
        match outcome {
            TerminationOutcome::Unconfirmed => {
                error!(pid = handle.pid, "companion may still be running")
            }
            _ => info!(pid = handle.pid, ?outcome, "companion stopped"),
        }
    }

    /// Return the companion pid if it is verifiably alive, otherwise
    /// (re)launch it.
    pub async fn get_or_start(&self) -> Option<u32> {
        if let Some(pid) = self.live_tracked_pid().await {
            return Some(pid);
        }
        let pid = self.start().await;
        if pid.is_none() {
            error!("unable to start or find the companion process");
        }
        pid
    }

    pub async fn status(&self) -> CompanionStatus {
        let mut slot = self.inner.companion.lock().await;
        let Some(handle) = slot.as_mut() else {
            return CompanionStatus {
                status: CompanionState::NotStarted,
                companion_pid: None,
            };
        };
        let status = match handle.probe() {
            Ok(Liveness::Alive) => CompanionState::Running,
            Ok(Liveness::Dead) => CompanionState::Dead,
            Err(e) => {
                warn!(pid = handle.pid, error = %e, "liveness check failed while reading status");
                CompanionState::Running
            }
        };
        CompanionStatus {
            status,
            companion_pid: Some(handle.pid),
        }
    }

    /// Register the callback run when the companion disappears. Replaces any
    /// previously registered callback.
    pub fn set_shutdown_callback<F>(&self, callback: F)
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.orchestrator.set_callback(callback);
    }

    pub fn is_monitoring(&self) -> bool {
        self.inner.monitor.is_running()
    }

    /// Host teardown: stop the companion, run `extra`, then mark the status
    /// record stopped. Runs once; later calls are ignored.
    pub async fn cleanup_all(&self, port: u16, extra: Option<CleanupFn>) {
        if self.inner.cleaned_up.swap(true, Ordering::SeqCst) {
            debug!("cleanup already performed");
            return;
        }
        info!(port, "running supervisor cleanup");
        self.stop().await;
        if let Some(extra) = extra {
            if let Err(e) = extra() {
                error!(error = %e, "extra cleanup failed");
            }
        }
        self.inner.state.write_shutdown_record(port);
    }

    /// Terminate externally tracked children with this supervisor's policy.
    pub async fn terminate_process_list(&self, children: &mut [Child]) -> Vec<TerminationOutcome> {
        terminate_process_list(children, &self.inner.policy).await
    }

    /// Pid of the tracked companion unless it is known to be dead, in which
    /// case the stale handle is dropped. A failed probe keeps the companion.
    async fn live_tracked_pid(&self) -> Option<u32> {
        let mut slot = self.inner.companion.lock().await;
        let handle = slot.as_mut()?;
        match handle.probe() {
            Ok(Liveness::Alive) => Some(handle.pid),
            Ok(Liveness::Dead) => {
                warn!(pid = handle.pid, "tracked companion is no longer running, replacing it");
                *slot = None;
                None
            }
            Err(e) => {
                warn!(pid = handle.pid, error = %e, "liveness check failed, keeping companion");
                Some(handle.pid)
            }
        }
    }

    fn arm_monitor(&self) {
        self.inner.orchestrator.rearm();
        self.inner.monitor.start(
            self.inner.companion.clone(),
            self.inner.orchestrator.clone(),
            self.inner.timing.poll_interval(),
        );
    }
}
