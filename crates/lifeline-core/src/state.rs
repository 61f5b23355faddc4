//! On-disk identity and status records for the supervising process.
//!
//! Two flat JSON objects are kept side by side:
//!
//! - the process record (`backend.pid`): `{"pid", "port", "timestamp"}`,
//!   written once at startup and replaced wholesale on restart;
//! - the status record (`backend_status.json`): the same fields plus
//!   `"status"`, flipped from `running` to `stopped` at shutdown with
//!   `pid: null`.
//!
//! Nothing in the supervisor reads these back; they exist so another
//! process (a desktop frontend, a CLI) can tell whether the backend is up.
//! Write failures are therefore logged and swallowed.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::StateConfig;

/// Identity of the supervising process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub port: u16,
    /// Seconds since the Unix epoch, fractional.
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: RunStatus,
    pub pid: Option<u32>,
    pub port: u16,
    pub timestamp: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Writer for the process and status records.
#[derive(Debug, Clone)]
pub struct StateStore {
    process_path: PathBuf,
    status_path: PathBuf,
}

impl StateStore {
    pub fn new(process_path: impl Into<PathBuf>, status_path: impl Into<PathBuf>) -> Self {
        Self {
            process_path: process_path.into(),
            status_path: status_path.into(),
        }
    }

    pub fn from_config(cfg: &StateConfig) -> Self {
        let dir = cfg.resolve_dir();
        Self::new(dir.join(&cfg.process_file), dir.join(&cfg.status_file))
    }

    /// Store both records under `dir` with the default file names.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let cfg = StateConfig {
            dir: Some(dir.as_ref().to_path_buf()),
            ..StateConfig::default()
        };
        Self::from_config(&cfg)
    }

    pub fn process_path(&self) -> &Path {
        &self.process_path
    }

    pub fn status_path(&self) -> &Path {
        &self.status_path
    }

    /// Record this process as running on `port`. Failures are logged only.
    pub fn write_startup_record(&self, port: u16) {
        if let Err(e) = self.try_write_startup_record(port) {
            error!(error = %e, "failed to write startup records");
        }
    }

    /// Mark this process as stopped, keeping `port`. Failures are logged only.
    pub fn write_shutdown_record(&self, port: u16) {
        if let Err(e) = self.try_write_shutdown_record(port) {
            error!(error = %e, "failed to write shutdown status record");
        }
    }

    pub fn try_write_startup_record(&self, port: u16) -> Result<(), StateError> {
        let pid = std::process::id();
        let process = ProcessRecord {
            pid,
            port,
            timestamp: now_timestamp(),
        };
        write_json(&self.process_path, &process)?;
        info!(path = %self.process_path.display(), pid, port, "process record written");

        let status = StatusRecord {
            status: RunStatus::Running,
            pid: Some(pid),
            port,
            timestamp: now_timestamp(),
        };
        write_json(&self.status_path, &status)?;
        info!(path = %self.status_path.display(), "status record written");
        Ok(())
    }

    pub fn try_write_shutdown_record(&self, port: u16) -> Result<(), StateError> {
        let status = StatusRecord {
            status: RunStatus::Stopped,
            pid: None,
            port,
            timestamp: now_timestamp(),
        };
        write_json(&self.status_path, &status)?;
        info!(path = %self.status_path.display(), port, "status record updated to stopped");
        Ok(())
    }

    /// Read the process record. `None` if missing or unparseable.
    pub fn read_process_record(&self) -> Option<ProcessRecord> {
        let content = std::fs::read_to_string(&self.process_path).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Read the status record. `None` if missing or unparseable.
    pub fn read_status(&self) -> Option<StatusRecord> {
        let content = std::fs::read_to_string(&self.status_path).ok()?;
        serde_json::from_str(&content).ok()
    }
}

fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StateError> {
    let io_err = |source| StateError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let json = serde_json::to_string(value)?;
    let mut file = std::fs::File::create(path).map_err(io_err)?;
    file.write_all(json.as_bytes()).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    Ok(())
}
