use std::{env, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(std::io::Error),
    #[error("failed to write config file: {0}")]
    Write(std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("no config path available (set XDG_CONFIG_HOME or HOME)")]
    PathUnavailable,
}

/// Immutable service configuration, constructed once at startup and passed
/// by reference into each component. No ambient global lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: Storage,
    pub auth: Auth,
    pub limits: Limits,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Storage {
    /// Root directory for the record collections.
    pub data_dir: path::PathBuf,
    /// Directory for per-check audit logs and their archives.
    pub logs_dir: path::PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auth {
    /// HMAC key for password hashing. Must be overridden in deployments.
    pub hashing_secret: String,
    /// Token lifetime granted on issue and extend.
    pub token_ttl_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum number of checks a single user may register.
    pub max_checks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub check_interval_secs: u64,
    pub token_sweep_interval_secs: u64,
    pub log_rotation_interval_secs: u64,
    /// Upper bound on concurrently in-flight probes per sweep.
    pub probe_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: Storage { data_dir: ".data".into(), logs_dir: ".logs".into() },
            auth: Auth {
                hashing_secret: "change-me-before-deploying".into(),
                token_ttl_ms: 3_600_000,
            },
            limits: Limits { max_checks: 5 },
            worker: WorkerConfig {
                check_interval_secs: 60,
                token_sweep_interval_secs: 60,
                log_rotation_interval_secs: 86_400,
                probe_concurrency: 10,
            },
        }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uptick/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::PathUnavailable);
    };

    Ok(path.join("uptick/config.toml"))
}

impl Config {
    /// Load configuration from a file, or from the default path when none
    /// is given. A default config is written out when the file is missing.
    pub fn from_config(
        optional_path: Option<impl AsRef<path::Path>>,
    ) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path).map_err(ConfigError::Read)?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file.
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::Write)?;
        }

        fs::write(path, config_str).map_err(ConfigError::Write)
    }
}
