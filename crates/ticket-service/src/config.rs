//! Process configuration for `ticketd`
//!
//! One TOML file carries a `[server]` table plus the engine tables
//! (`[sla]`, `[sweep]`, `[suggestion]`, `[activity]`, `[[users]]`,
//! `[[teams]]`). Environment variables override the file; CLI flags
//! override both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use lifecycle::config::ConfigError;
use lifecycle::EngineConfig;
use serde::{Deserialize, Serialize};

const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_bind")]
    pub bind: String,
    /// RocksDB directory; in-memory storage when unset
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "ServerConfig::default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    fn default_bind() -> String {
        DEFAULT_BIND.to_string()
    }

    fn default_request_timeout() -> u64 {
        30
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: Self::default_bind(),
            data_dir: None,
            request_timeout_secs: Self::default_request_timeout(),
        }
    }
}

/// Everything `ticketd` reads at startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(flatten)]
    pub engine: EngineConfig,
}

impl ServiceConfig {
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&src)
    }

    /// Load `path` if given, else `TICKETD_CONFIG` if set, else defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("TICKETD_CONFIG").ok().map(PathBuf::from));
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Apply `TICKETD_BIND`, `TICKETD_DATA_DIR` and `TICKETD_SUGGEST_URL`.
    pub fn with_env_overrides(mut self) -> Self {
        self.server.bind = std::env::var("TICKETD_BIND").unwrap_or_else(|_| self.server.bind.clone());
        if let Ok(dir) = std::env::var("TICKETD_DATA_DIR") {
            if !dir.trim().is_empty() {
                self.server.data_dir = Some(PathBuf::from(dir));
            }
        }
        self.engine = self.engine.with_env_overrides();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind.trim().is_empty() {
            return Err(ConfigError::Invalid("server.bind must not be empty".into()));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "server.request_timeout_secs must be positive".into(),
            ));
        }
        self.engine.validate()
    }
}
