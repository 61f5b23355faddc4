use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use lifeline_core::process::exit_immediately;
use tracing::{error, info, warn};

/// Invoked once when the companion disappears. Errors and panics are logged.
pub type ShutdownCallback = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Performs the last-resort process exit. Production uses
/// [`exit_immediately`]; tests substitute a recorder.
pub type ExitHook = Arc<dyn Fn(i32) + Send + Sync>;

/// Exit code used by the forced-exit fallback.
pub const FORCED_EXIT_CODE: i32 = 0;

/// Runs the shutdown sequence after liveness loss.
///
/// The sequence is single-shot per arming: the first `trigger` disarms it and
/// later triggers are ignored until `rearm` is called by a fresh launch.
pub struct ShutdownOrchestrator {
    armed: AtomicBool,
    triggers: AtomicUsize,
    callback: RwLock<Option<ShutdownCallback>>,
    exit_hook: ExitHook,
    force_exit_delay: Duration,
}

impl std::fmt::Debug for ShutdownOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownOrchestrator")
            .field("armed", &self.is_armed())
            .field("triggers", &self.trigger_count())
            .field("has_callback", &self.has_callback())
            .field("force_exit_delay", &self.force_exit_delay)
            .finish()
    }
}

impl ShutdownOrchestrator {
    pub fn new(force_exit_delay: Duration, exit_hook: ExitHook) -> Self {
        Self {
            armed: AtomicBool::new(true),
            triggers: AtomicUsize::new(0),
            callback: RwLock::new(None),
            exit_hook,
            force_exit_delay,
        }
    }

    /// Orchestrator whose fallback really terminates the process.
    pub fn with_process_exit(force_exit_delay: Duration) -> Self {
        Self::new(force_exit_delay, Arc::new(|code| exit_immediately(code)))
    }

    /// Replace the registered callback. Only the latest one is honoured.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let callback: ShutdownCallback = Arc::new(callback);
        let mut slot = self.callback.write().unwrap_or_else(|p| p.into_inner());
        *slot = Some(callback);
        info!("shutdown callback registered");
    }

    pub fn has_callback(&self) -> bool {
        self.callback
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .is_some()
    }

    pub fn rearm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// How many times the shutdown sequence has actually run.
    pub fn trigger_count(&self) -> usize {
        self.triggers.load(Ordering::SeqCst)
    }

    /// Run the shutdown sequence for a lost companion.
    ///
    /// Returns `false` without doing anything if already triggered since the
    /// last `rearm`. The forced-exit timer is armed before the callback runs,
    /// so a callback that hangs cannot hold the process open past the delay.
    pub async fn trigger(&self, companion_pid: u32) -> bool {
        if self
            .armed
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(companion_pid, "liveness loss already handled, ignoring");
            return false;
        }
        self.triggers.fetch_add(1, Ordering::SeqCst);
        info!(companion_pid, "starting automatic shutdown");

        self.schedule_forced_exit();

        let callback = self
            .callback
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        match callback {
            Some(callback) => {
                info!("invoking shutdown callback");
                match tokio::task::spawn_blocking(move || callback()).await {
                    Ok(Ok(())) => info!("shutdown callback completed"),
                    Ok(Err(e)) => error!(error = %e, "shutdown callback failed"),
                    Err(e) => error!(error = %e, "shutdown callback panicked"),
                }
            }
            None => warn!("no shutdown callback registered"),
        }
        true
    }

    fn schedule_forced_exit(&self) {
        let delay = self.force_exit_delay;
        let hook = self.exit_hook.clone();
        let spawned = std::thread::Builder::new()
            .name("lifeline-force-exit".into())
            .spawn(move || {
                std::thread::sleep(delay);
                warn!(delay_ms = delay.as_millis() as u64, "forcing process exit");
                hook(FORCED_EXIT_CODE);
            });
        if let Err(e) = spawned {
            error!(error = %e, "could not schedule forced exit, exiting now");
            (self.exit_hook)(FORCED_EXIT_CODE);
        }
    }
}
