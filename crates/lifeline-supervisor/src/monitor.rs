use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::launcher::{CompanionSlot, Liveness};
use crate::orchestrator::ShutdownOrchestrator;

struct MonitorRun {
    running: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Owns the single background polling task.
///
/// Each run gets its own `running` flag, so a run that was stopped and is
/// still finishing its last sleep can never be revived by a later start.
#[derive(Default)]
pub(crate) struct LivenessMonitor {
    run: Mutex<Option<MonitorRun>>,
}

impl LivenessMonitor {
    /// Start polling `companion`. No-op if a run is already active.
    pub(crate) fn start(
        &self,
        companion: CompanionSlot,
        orchestrator: Arc<ShutdownOrchestrator>,
        interval: Duration,
    ) -> bool {
        let mut run = self.run.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(active) = run.as_ref() {
            if active.running.load(Ordering::SeqCst) && !active.task.is_finished() {
                info!("liveness monitor already running");
                return false;
            }
        }

        let running = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(poll_loop(
            companion,
            orchestrator,
            running.clone(),
            interval,
        ));
        *run = Some(MonitorRun { running, task });
        info!(interval_ms = interval.as_millis() as u64, "liveness monitor started");
        true
    }

    /// Ask the active run to stop at its next iteration.
    pub(crate) fn stop(&self) {
        let run = self.run.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(active) = run.as_ref() {
            active.running.store(false, Ordering::SeqCst);
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        let run = self.run.lock().unwrap_or_else(|p| p.into_inner());
        run.as_ref()
            .is_some_and(|r| r.running.load(Ordering::SeqCst) && !r.task.is_finished())
    }
}

async fn poll_loop(
    companion: CompanionSlot,
    orchestrator: Arc<ShutdownOrchestrator>,
    running: Arc<AtomicBool>,
    interval: Duration,
) {
    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(interval).await;
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let probe = {
            let mut slot = companion.lock().await;
            slot.as_mut().map(|handle| (handle.pid, handle.probe()))
        };
        match probe {
            None => debug!("no companion tracked"),
            Some((_, Ok(Liveness::Alive))) => {}
            Some((pid, Ok(Liveness::Dead))) => {
                warn!(pid, "companion process is gone");
                running.store(false, Ordering::SeqCst);
                orchestrator.trigger(pid).await;
                break;
            }
            Some((pid, Err(e))) => {
                error!(pid, error = %e, "liveness check failed, will retry");
            }
        }
    }
    info!("liveness monitor stopped");
}
