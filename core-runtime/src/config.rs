//! # Service Configuration
//!
//! The service reads a TOML file whose path comes from the `CONFIG_PATH`
//! environment variable. A `.env` file in the working directory is loaded
//! first if present.
//!
//! ```toml
//! env = "local"            # local | dev | prod
//!
//! [database]
//! url = "sqlite:songs.db"
//! max_connections = 5
//!
//! [redis]
//! url = "redis://localhost:6379/0"
//! recover_on_start = true
//!
//! [http]
//! address = "0.0.0.0:8080"
//! request_timeout_secs = 30
//!
//! [music_info]
//! base_url = "http://localhost:8081"
//! timeout_secs = 10
//! ```
//!
//! `DATABASE_URL`, `REDIS_URL`, `HTTP_ADDRESS` and `MUSIC_INFO_URL` override
//! the matching file values.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the config file path
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Deployment environment; selects the logging preset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub env: Environment,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub http: HttpSettings,
    pub music_info: MusicInfoSettings,
}

#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseSettings {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisSettings {
    pub url: String,
    /// Rebuild the cache from the database at startup
    #[serde(default)]
    pub recover_on_start: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpSettings {
    pub address: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MusicInfoSettings {
    pub base_url: String,
    #[serde(default = "default_music_info_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_music_info_timeout_secs() -> u64 {
    10
}

// Connection URLs may carry credentials.
impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("url", &crate::logging::redact_url(&self.url))
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .finish()
    }
}

impl fmt::Debug for RedisSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisSettings")
            .field("url", &crate::logging::redact_url(&self.url))
            .field("recover_on_start", &self.recover_on_start)
            .finish()
    }
}

impl DatabaseSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

impl HttpSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl MusicInfoSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Load `.env`, then the file named by `CONFIG_PATH`, then environment overrides.
    pub fn load() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "Failed to load .env file"),
        }

        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| Error::Config(format!("{} is not set", CONFIG_PATH_ENV)))?;

        let mut config = Self::from_path(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Config(format!(
                "config file does not exist: {}",
                path.display()
            )));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply environment overrides looked up through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(url) = non_empty("REDIS_URL") {
            self.redis.url = url;
        }
        if let Some(address) = non_empty("HTTP_ADDRESS") {
            self.http.address = address;
        }
        if let Some(url) = non_empty("MUSIC_INFO_URL") {
            self.music_info.base_url = url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("database.url", &self.database.url),
            ("redis.url", &self.redis.url),
            ("http.address", &self.http.address),
            ("music_info.base_url", &self.music_info.base_url),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} must not be empty", field)));
            }
        }

        if self.database.max_connections == 0 {
            return Err(Error::Config(
                "database.max_connections must be > 0".to_string(),
            ));
        }
        if self.http.request_timeout_secs == 0 {
            return Err(Error::Config(
                "http.request_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.music_info.timeout_secs == 0 {
            return Err(Error::Config(
                "music_info.timeout_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
