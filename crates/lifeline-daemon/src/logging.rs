use lifeline_core::config::LoggingConfig;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` wins over `config.level`. Output is human-readable unless
/// `config.json` is set. Safe to call more than once; later calls are no-ops.
pub fn init_logging(service_name: &str, config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .try_init()
            .ok();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_level(true)
            .try_init()
            .ok();
    }

    tracing::info!(
        service = service_name,
        pid = std::process::id(),
        json = config.json,
        "logging initialised"
    );
}
