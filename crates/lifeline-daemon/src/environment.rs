use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lifeline_core::config::Config;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "LIFELINE_CONFIG";

/// Outcome of loading `.env` and the config file, reported once logging
/// is up.
#[derive(Debug)]
pub struct Environment {
    pub config: Config,
    pub config_path: Option<PathBuf>,
    pub env_file: EnvFile,
}

#[derive(Debug)]
pub enum EnvFile {
    Loaded(PathBuf),
    Missing,
    Invalid(String),
}

impl Environment {
    /// Load `.env`, then the config named by `LIFELINE_CONFIG` (or the
    /// default path), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let env_file = match dotenv::dotenv() {
            Ok(path) => EnvFile::Loaded(path),
            Err(e) if e.not_found() => EnvFile::Missing,
            Err(e) => EnvFile::Invalid(e.to_string()),
        };

        let explicit = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let (mut config, config_path) = resolve_config(explicit.as_deref())?;
        config.apply_env_overrides();
        Ok(Self {
            config,
            config_path,
            env_file,
        })
    }

    /// Log what was loaded. Call after logging is initialised.
    pub fn report(&self) {
        match &self.env_file {
            EnvFile::Loaded(path) => tracing::info!(path = %path.display(), "loaded environment file"),
            EnvFile::Missing => tracing::debug!("no .env file found"),
            EnvFile::Invalid(e) => tracing::warn!(error = %e, "failed to parse .env file"),
        }
        match &self.config_path {
            Some(path) => tracing::info!(path = %path.display(), "loaded config"),
            None => tracing::info!("no config file found, using defaults"),
        }
    }
}

/// Load the config from `explicit`, or from the default path if it exists.
///
/// An explicit path must exist; a missing default path yields defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<(Config, Option<PathBuf>)> {
    if let Some(path) = explicit {
        let config = Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?;
        return Ok((config, Some(path.to_path_buf())));
    }
    let default = Config::default_path();
    let source = default.exists().then_some(default);
    let config = Config::load().context("failed to load default config")?;
    Ok((config, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lifeline.toml");
        std::fs::write(&path, "[daemon]\nport = 6100\n").unwrap();

        let (config, source) = resolve_config(Some(&path)).unwrap();

        assert_eq!(config.daemon.port, 6100);
        assert_eq!(source.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_config(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to load config"));
    }

    #[test]
    fn default_path_is_used_when_none_given() {
        let home = tempfile::tempdir().unwrap();
        let previous = std::env::var_os("HOME");
        std::env::set_var("HOME", home.path());

        let (fallback, fallback_source) = resolve_config(None).unwrap();

        let path = Config::default_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[daemon]\nport = 6200\n").unwrap();
        let loaded = resolve_config(None);

        match previous {
            Some(value) => std::env::set_var("HOME", value),
            None => std::env::remove_var("HOME"),
        }

        assert_eq!(fallback.daemon.port, 5008);
        assert_eq!(fallback_source, None);
        let (config, source) = loaded.unwrap();
        assert_eq!(config.daemon.port, 6200);
        assert_eq!(source, Some(home.path().join(".lifeline").join("config.toml")));
    }

    #[test]
    fn invalid_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lifeline.toml");
        std::fs::write(&path, "[timing]\npoll_interval_ms = 0\n").unwrap();
        assert!(resolve_config(Some(&path)).is_err());
    }
}
