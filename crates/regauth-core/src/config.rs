//! Configuration and auth file location.
//!
//! Optional settings are read from `~/.config/regauth/config.json`. The auth
//! file is located, in order of precedence, from the `--authfile` flag, the
//! `REGISTRY_AUTH_FILE` environment variable, the config file,
//! `$XDG_RUNTIME_DIR/containers/auth.json` and finally
//! `~/.config/containers/auth.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::store::{FileCredentialStore, DEFAULT_LOCK_TIMEOUT};

/// Application name used for the config directory
const APP_NAME: &str = "regauth";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the auth file location
pub const AUTH_FILE_ENV: &str = "REGISTRY_AUTH_FILE";

/// Environment variable naming the Docker config directory
pub const DOCKER_CONFIG_ENV: &str = "DOCKER_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Auth file used when neither the flag nor the environment names one.
    pub auth_file: Option<PathBuf>,
    /// Location of the Docker `config.json` consulted for `docker login` credentials.
    pub docker_config: Option<PathBuf>,
    /// How long a writer waits for the auth file lock.
    pub lock_timeout_ms: Option<u64>,
}

/// Inputs to auth file resolution, separated from the process environment
/// so the precedence rules can be exercised directly.
#[derive(Debug, Clone, Default)]
pub struct PathSources {
    pub flag: Option<PathBuf>,
    pub registry_auth_file: Option<PathBuf>,
    pub xdg_runtime_dir: Option<PathBuf>,
    pub config_dir: Option<PathBuf>,
    pub docker_config_dir: Option<PathBuf>,
    pub home_dir: Option<PathBuf>,
}

impl PathSources {
    /// Collect sources from the process environment.
    pub fn from_env(flag: Option<PathBuf>) -> Self {
        let env_path = |name: &str| {
            std::env::var_os(name)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };
        Self {
            flag,
            registry_auth_file: env_path(AUTH_FILE_ENV),
            xdg_runtime_dir: env_path("XDG_RUNTIME_DIR"),
            config_dir: dirs::config_dir(),
            docker_config_dir: env_path(DOCKER_CONFIG_ENV),
            home_dir: dirs::home_dir(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let Some(path) = Self::config_path() else {
            return Ok(Self::default());
        };
        Self::load_from_path(&path)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents =
            std::fs::read_to_string(path).map_err(|e| StoreError::from_io(path, e))?;
        serde_json::from_str(&contents).map_err(|e| {
            StoreError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn auth_file_path(&self, sources: &PathSources) -> Result<PathBuf> {
        let path = sources
            .flag
            .clone()
            .or_else(|| sources.registry_auth_file.clone())
            .or_else(|| self.auth_file.clone())
            .or_else(|| {
                sources
                    .xdg_runtime_dir
                    .as_ref()
                    .map(|dir| dir.join("containers").join("auth.json"))
            })
            .or_else(|| {
                sources
                    .config_dir
                    .as_ref()
                    .map(|dir| dir.join("containers").join("auth.json"))
            })
            .ok_or_else(|| StoreError::Config("could not determine auth file location".into()))?;

        debug!(path = %path.display(), "using auth file");
        Ok(path)
    }

    /// Docker `config.json` location, if one can be determined.
    pub fn docker_config_path(&self, sources: &PathSources) -> Option<PathBuf> {
        sources
            .docker_config_dir
            .as_ref()
            .map(|dir| dir.join("config.json"))
            .or_else(|| self.docker_config.clone())
            .or_else(|| {
                sources
                    .home_dir
                    .as_ref()
                    .map(|home| home.join(".docker").join("config.json"))
            })
    }

    /// Open the auth file store selected by `sources`.
    pub fn open_store(&self, sources: &PathSources) -> Result<FileCredentialStore> {
        Ok(FileCredentialStore::new(self.auth_file_path(sources)?)
            .with_lock_timeout(self.lock_timeout()))
    }
}
