//! Heartbeat companion. Does nothing but stay alive; its disappearance is
//! what tells the daemon to shut down.

use std::time::Duration;

use anyhow::Result;
use lifeline_core::config::LoggingConfig;
use lifeline_daemon::logging::init_logging;
use tracing::{info, trace};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logging("lifeline-heartbeat", &LoggingConfig::default());
    info!(pid = std::process::id(), "heartbeat process started");

    let reason = idle_until_signalled().await?;

    info!(%reason, "heartbeat process terminated");
    Ok(())
}

#[cfg(unix)]
async fn idle_until_signalled() -> Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tick.tick() => trace!("heartbeat tick"),
            _ = term.recv() => return Ok("SIGTERM"),
            _ = int.recv() => return Ok("SIGINT"),
        }
    }
}

#[cfg(not(unix))]
async fn idle_until_signalled() -> Result<&'static str> {
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tick.tick() => trace!("heartbeat tick"),
            res = tokio::signal::ctrl_c() => {
                res?;
                return Ok("ctrl-c");
            }
        }
    }
}
