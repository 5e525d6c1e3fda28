//! Configuration types and loading for hachi.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::error::Result;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the hachi database.
    pub database: PathBuf,

    /// HTTP API server configuration.
    pub server: ServerConfig,

    /// Metric sync configuration.
    pub sync: SyncConfig,

    /// Lifetime of pending OAuth state tokens, in seconds.
    pub oauth_state_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::APP_NAME);

        Self {
            database: data_dir.join("hachi.db"),
            server: ServerConfig::default(),
            sync: SyncConfig::default(),
            oauth_state_ttl_secs: 600,
        }
    }
}

impl Config {
    /// Load configuration from a specific file, with `HACHI__*` environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let mut config = Self::from_sources(Some(path))?;
        config.expand_paths();
        Ok(config)
    }

    /// Layer defaults, an optional TOML file and the environment.
    ///
    /// Environment keys use a double underscore as separator, e.g.
    /// `HACHI__SERVER__PORT=8080` or `HACHI__DATABASE=/tmp/hachi.db`.
    fn from_sources(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&Self::default())?;
        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(&crate::env_prefix())
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Get the default config file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::APP_NAME)
            .join("config.toml")
    }

    /// Save configuration to a specific file path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Ensure config exists at the given path, creating defaults if missing.
    pub fn ensure_at(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_path(path)
        } else {
            let mut config = Self::default();
            config.expand_paths();
            config.save_to_path(path)?;
            Self::load_from_path(path)
        }
    }

    /// Expand a path, replacing ~ and environment variables.
    pub fn expand_path(path: &str) -> PathBuf {
        let expanded = shellexpand::full(path)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| path.to_string());
        PathBuf::from(expanded)
    }

    fn expand_paths(&mut self) {
        self.database = Self::expand_path(&self.database.to_string_lossy());
    }

    /// Lifetime of pending OAuth state tokens, capped at one day.
    pub fn oauth_state_ttl(&self) -> chrono::Duration {
        const MAX_TTL_SECS: i64 = 24 * 60 * 60;
        let secs = i64::try_from(self.oauth_state_ttl_secs).unwrap_or(MAX_TTL_SECS);
        chrono::Duration::seconds(secs.min(MAX_TTL_SECS))
    }
}

/// HTTP API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,

    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Metric sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// YouTube Data API base URL.
    pub youtube_api_base: String,

    /// Instagram Graph API base URL.
    pub instagram_api_base: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            youtube_api_base: "https://www.googleapis.com/youtube/v3".to_string(),
            instagram_api_base: "https://graph.instagram.com/v18.0".to_string(),
            timeout_secs: 10,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
