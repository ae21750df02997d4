//! Configuration loading for the Narrify client.
//!
//! All fields are required unless explicitly marked optional.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub session_path: PathBuf,
    pub session_poll_ms: u64,
    pub search_debounce_ms: u64,
    pub feed_page_size: usize,
    /// Refetch list queries older than this on next read.
    #[serde(default)]
    pub stale_after_ms: Option<u64>,
    /// `tracing` filter directive; `RUST_LOG` wins when set.
    #[serde(default)]
    pub log_filter: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or NARRIFY_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must be an http(s) URL".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.session_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "session_path",
                reason: "must not be empty".to_string(),
            });
        }
        if self.session_poll_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session_poll_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.search_debounce_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "search_debounce_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.feed_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "feed_page_size",
                reason: "must be > 0".to_string(),
            });
        }
        if self.stale_after_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "stale_after_ms",
                reason: "must be > 0 when set".to_string(),
            });
        }
        Ok(())
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn session_poll_interval(&self) -> Duration {
        Duration::from_millis(self.session_poll_ms)
    }

    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_ms.map(Duration::from_millis)
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("NARRIFY_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
