//! Configuration management.
//!
//! Two layers: [`Config`] holds process-level settings sourced from the
//! environment (credentials, endpoints, paths, logging), while
//! [`profiles::AutomationsConfig`] is the JSON document describing the
//! automation profiles a run sweeps over.

pub mod profiles;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Default scheduling-API endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.postforme.dev/v1";

/// Default archive endpoint.
pub const DEFAULT_ARCHIVE_BASE_URL: &str = "https://archive.org";

/// Process-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Scheduling API settings
    pub api: ApiConfig,

    /// Archive feed settings
    pub archive: ArchiveConfig,

    /// Paths for state and working files
    pub paths: PathsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Scheduling-API client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Bearer token for the scheduling API
    pub api_key: String,

    /// Base URL of the scheduling API
    pub base_url: String,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Upload timeout in seconds (media PUTs run long)
    pub upload_timeout_secs: u64,
}

/// Archive feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Base URL of the archive API
    pub base_url: String,

    /// Rate limit for archive requests (requests per second)
    pub rate_limit: u32,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Download timeout in seconds
    pub download_timeout_secs: u64,
}

/// Filesystem paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// State document location
    pub state_file: PathBuf,

    /// Scratch directory for downloads and transcodes
    pub work_dir: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ARCHIVECAST_API_KEY")
            .ok()
            .map(|v| v.trim().to_string())
            .unwrap_or_default();

        Ok(Self {
            api: ApiConfig {
                api_key,
                base_url: env_string("ARCHIVECAST_API_BASE_URL", DEFAULT_API_BASE_URL),
                request_timeout_secs: env_parse("ARCHIVECAST_API_TIMEOUT", 60),
                upload_timeout_secs: env_parse("ARCHIVECAST_UPLOAD_TIMEOUT", 600),
            },
            archive: ArchiveConfig {
                base_url: env_string("ARCHIVECAST_ARCHIVE_BASE_URL", DEFAULT_ARCHIVE_BASE_URL),
                rate_limit: env_parse("ARCHIVECAST_ARCHIVE_RATE_LIMIT", 2),
                request_timeout_secs: env_parse("ARCHIVECAST_ARCHIVE_TIMEOUT", 60),
                download_timeout_secs: env_parse("ARCHIVECAST_DOWNLOAD_TIMEOUT", 180),
            },
            paths: PathsConfig {
                state_file: env_string("ARCHIVECAST_STATE_FILE", "archivecast_state.json").into(),
                work_dir: env_string("ARCHIVECAST_WORK_DIR", "tmp/archivecast").into(),
            },
            logging: LoggingConfig {
                level: env_string("ARCHIVECAST_LOG_LEVEL", "info"),
                format: env_string("ARCHIVECAST_LOG_FORMAT", "text"),
            },
        })
    }

    /// Validate values a run depends on. A missing API key is a fatal
    /// configuration error; publishing must never degrade to a silent no-op.
    pub fn validate(&self) -> Result<()> {
        if self.api.api_key.is_empty() {
            return Err(Error::config(
                "missing API key: set ARCHIVECAST_API_KEY",
            ));
        }
        if self.archive.rate_limit == 0 {
            return Err(Error::config("archive rate_limit must be greater than 0"));
        }
        Ok(())
    }

    #[must_use]
    pub fn api_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.api.request_timeout_secs)
    }

    #[must_use]
    pub fn archive_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.archive.request_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                api_key: String::new(),
                base_url: DEFAULT_API_BASE_URL.to_string(),
                request_timeout_secs: 60,
                upload_timeout_secs: 600,
            },
            archive: ArchiveConfig {
                base_url: DEFAULT_ARCHIVE_BASE_URL.to_string(),
                rate_limit: 2,
                request_timeout_secs: 60,
                download_timeout_secs: 180,
            },
            paths: PathsConfig {
                state_file: PathBuf::from("archivecast_state.json"),
                work_dir: PathBuf::from("tmp/archivecast"),
            },
            logging: LoggingConfig {
                level: String::from("info"),
                format: String::from("text"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_rejects_missing_api_key() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_with_key_is_valid() {
        let mut config = Config::default();
        config.api.api_key = "token".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let mut config = Config::default();
        config.api.api_key = "token".to_string();
        config.archive.rate_limit = 0;
        assert!(config.validate().is_err());
    }
}
