//! lifeline daemon: writes its process records, launches the heartbeat
//! companion and shuts itself down if the companion disappears.

use anyhow::{Context, Result};
use lifeline_daemon::environment::Environment;
use lifeline_daemon::host::Host;
use lifeline_daemon::logging::init_logging;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let env = Environment::load().context("failed to configure application environment")?;
    init_logging("lifeline-daemon", &env.config.logging);
    env.report();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        port = env.config.daemon.port,
        companion = %env.config.companion.resolve_path().display(),
        "lifeline daemon starting"
    );

    let host = Host::new(env.config);
    if let Err(e) = host.run().await {
        error!(error = %e, "daemon execution failed");
        return Err(e);
    }
    Ok(())
}
