use anyhow::Result;
use lifeline_core::config::Config;
use lifeline_core::shutdown::ShutdownSignal;
use lifeline_supervisor::Supervisor;
use tracing::{error, info, warn};

/// Reason recorded when the companion disappears.
pub const COMPANION_LOST: &str = "companion process lost";

/// The backend host process.
///
/// Writes its identity records, keeps a companion alive under supervision,
/// and tears everything down once when shutdown is requested by a signal or
/// by the supervisor's liveness-loss callback.
pub struct Host {
    config: Config,
    supervisor: Supervisor,
    shutdown: ShutdownSignal,
}

impl Host {
    pub fn new(config: Config) -> Self {
        let supervisor = Supervisor::new(&config);
        Self::with_supervisor(config, supervisor)
    }

    pub fn with_supervisor(config: Config, supervisor: Supervisor) -> Self {
        Self {
            config,
            supervisor,
            shutdown: ShutdownSignal::new(),
        }
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Handle that can trigger shutdown from another task.
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Run until shutdown is triggered, then clean up.
    pub async fn run(&self) -> Result<()> {
        let port = self.config.daemon.port;
        spawn_signal_listeners(self.shutdown.clone());
        self.supervisor.state().write_startup_record(port);

        let shutdown = self.shutdown.clone();
        self.supervisor.set_shutdown_callback(move || {
            shutdown.trigger(COMPANION_LOST);
            Ok(())
        });

        match self.supervisor.start().await {
            Some(pid) => info!(pid, port, "companion supervision active"),
            None => warn!("companion unavailable, continuing without liveness supervision"),
        }

        info!(host = %self.config.daemon.host, port, "daemon running");

        let reason = self.shutdown.wait().await;
        info!(%reason, "shutting down");
        self.supervisor.cleanup_all(port, None).await;
        info!("daemon stopped");
        Ok(())
    }
}

/// Install SIGINT/SIGTERM handlers now and trigger `shutdown` when one fires.
fn spawn_signal_listeners(shutdown: ShutdownSignal) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        for (kind, name) in [
            (SignalKind::interrupt(), "SIGINT"),
            (SignalKind::terminate(), "SIGTERM"),
        ] {
            match signal(kind) {
                Ok(mut stream) => {
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if stream.recv().await.is_some() {
                            info!(signal = name, "signal received");
                            shutdown.trigger(name);
                        }
                    });
                }
                Err(e) => error!(signal = name, error = %e, "failed to install signal handler"),
            }
        }
    }
    #[cfg(not(unix))]
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("ctrl-c received");
                shutdown.trigger("ctrl-c");
            }
            Err(e) => error!(error = %e, "failed to listen for ctrl-c"),
        }
    });
}
