use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration loaded from `~/.lifeline/config.toml`.
///
/// Every section falls back to its defaults, so an empty or missing file
/// yields a working supervisor pointed at `lifeline-heartbeat` next to the
/// running executable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub companion: CompanionConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load config from `~/.lifeline/config.toml`, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(path)
        } else {
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&text)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `LIFELINE_PORT` from the environment, if set.
    ///
    /// An unparseable value is logged and ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var("LIFELINE_PORT") {
            match raw.trim().parse::<u16>() {
                Ok(port) => self.daemon.port = port,
                Err(e) => tracing::warn!(value = %raw, error = %e, "ignoring invalid LIFELINE_PORT"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timing.validate()?;
        if self.companion.program.trim().is_empty() {
            return Err(ConfigError::Validation(
                "companion.program must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        default_data_dir().join("config.toml")
    }
}

/// `~/.lifeline`, or `./.lifeline` when no home directory is known.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".lifeline")
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_daemon_port")]
    pub port: u16,
    #[serde(default = "default_daemon_host")]
    pub host: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            port: default_daemon_port(),
            host: default_daemon_host(),
        }
    }
}

fn default_daemon_port() -> u16 {
    5008
}
fn default_daemon_host() -> String {
    "127.0.0.1".into()
}

/// Where the companion executable lives and how to invoke it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanionConfig {
    /// Directory the program is resolved against. Defaults to the directory
    /// of the running executable.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
    #[serde(default = "default_companion_program")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            program: default_companion_program(),
            args: Vec::new(),
        }
    }
}

impl CompanionConfig {
    /// Resolve the companion executable path.
    ///
    /// An absolute `program` is used as-is; otherwise it is joined onto
    /// `base_dir` (or the current executable's directory).
    pub fn resolve_path(&self) -> PathBuf {
        let program = PathBuf::from(&self.program);
        if program.is_absolute() {
            return program;
        }
        let base = self.base_dir.clone().unwrap_or_else(|| {
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        base.join(program)
    }
}

fn default_companion_program() -> String {
    "lifeline-heartbeat".into()
}

/// Supervisor timings, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_launch_grace_ms")]
    pub launch_grace_ms: u64,
    #[serde(default = "default_graceful_timeout_ms")]
    pub graceful_timeout_ms: u64,
    #[serde(default = "default_forceful_timeout_ms")]
    pub forceful_timeout_ms: u64,
    #[serde(default = "default_force_exit_delay_ms")]
    pub force_exit_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            launch_grace_ms: default_launch_grace_ms(),
            graceful_timeout_ms: default_graceful_timeout_ms(),
            forceful_timeout_ms: default_forceful_timeout_ms(),
            force_exit_delay_ms: default_force_exit_delay_ms(),
        }
    }
}

impl TimingConfig {
    pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn launch_grace(&self) -> Duration {
        Duration::from_millis(self.launch_grace_ms)
    }

    pub fn graceful_timeout(&self) -> Duration {
        Duration::from_millis(self.graceful_timeout_ms)
    }

    pub fn forceful_timeout(&self) -> Duration {
        Duration::from_millis(self.forceful_timeout_ms)
    }

    pub fn force_exit_delay(&self) -> Duration {
        Duration::from_millis(self.force_exit_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("poll_interval_ms", self.poll_interval_ms),
            ("launch_grace_ms", self.launch_grace_ms),
            ("graceful_timeout_ms", self.graceful_timeout_ms),
            ("forceful_timeout_ms", self.forceful_timeout_ms),
            ("force_exit_delay_ms", self.force_exit_delay_ms),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(ConfigError::Validation(format!(
                    "timing.{name} must be greater than 0"
                )));
            }
        }
        if self.poll_interval_ms > Self::MAX_POLL_INTERVAL_MS {
            return Err(ConfigError::Validation(format!(
                "timing.poll_interval_ms must be at most {}",
                Self::MAX_POLL_INTERVAL_MS
            )));
        }
        Ok(())
    }
}

fn default_poll_interval_ms() -> u64 {
    2_000
}
fn default_launch_grace_ms() -> u64 {
    500
}
fn default_graceful_timeout_ms() -> u64 {
    5_000
}
fn default_forceful_timeout_ms() -> u64 {
    2_000
}
fn default_force_exit_delay_ms() -> u64 {
    3_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Directory holding the record files. Defaults to `~/.lifeline`.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_process_file")]
    pub process_file: String,
    #[serde(default = "default_status_file")]
    pub status_file: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: None,
            process_file: default_process_file(),
            status_file: default_status_file(),
        }
    }
}

impl StateConfig {
    pub fn resolve_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(default_data_dir)
    }
}

fn default_process_file() -> String {
    "backend.pid".into()
}
fn default_status_file() -> String {
    "backend_status.json".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}
