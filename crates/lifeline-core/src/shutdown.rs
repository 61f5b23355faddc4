use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// ShutdownSignal: cooperative shutdown for the host process
// ---------------------------------------------------------------------------

/// Latched shutdown flag shared between the host's signal handlers, the
/// supervisor's shutdown callback and the main task.
///
/// Once triggered it stays triggered; `wait()` returns immediately for late
/// subscribers, so a trigger that races ahead of the waiter is never lost.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    shutting_down: Arc<AtomicBool>,
    tx: Arc<watch::Sender<Option<String>>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            shutting_down: Arc::new(AtomicBool::new(false)),
            tx: Arc::new(tx),
        }
    }

    /// Check if shutdown has been triggered (non-blocking).
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// The reason passed to the first `trigger`, if any.
    pub fn reason(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    /// Trigger shutdown. Only the first call has an effect; returns whether
    /// this call was the one that latched the signal.
    pub fn trigger(&self, reason: impl Into<String>) -> bool {
        if self
            .shutting_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let reason = reason.into();
            info!(%reason, "shutdown signal triggered");
            self.tx.send_replace(Some(reason));
            true
        } else {
            debug!("shutdown already triggered");
            false
        }
    }

    /// Wait until shutdown has been triggered and return its reason.
    pub async fn wait(&self) -> String {
        let mut rx = self.tx.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(reason) = current {
                return reason;
            }
            if rx.changed().await.is_err() {
                return String::from("signal dropped");
            }
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
