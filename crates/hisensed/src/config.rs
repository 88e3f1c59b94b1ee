//! Configuration file parsing and structures.
//!
//! hisensed uses TOML for declarative configuration: a `[logging]` table, an
//! optional `[api]` table for the HTTP front end, and one
//! `[integrations.hisense.<entry>]` table per television.

use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use tracing_subscriber::filter::LevelFilter;

use crate::integrations::hisense::TvConfig;

/// Top-level configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub api: Option<ApiConfig>,

    #[serde(default)]
    pub integrations: IntegrationsConfig,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,
}

fn default_api_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    8765
}

/// HTTP API configuration
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    /// Address to listen on (e.g., "127.0.0.1")
    #[serde(default = "default_api_bind")]
    pub bind: String,

    /// Port to listen on
    #[serde(default = "default_api_port")]
    pub port: u16,
}

/// Integration configuration container
#[derive(Debug, Default, Deserialize)]
pub struct IntegrationsConfig {
    /// Hisense TV integration entries
    /// Key = entry_id (becomes part of the entity ids), Value = TV config
    #[serde(default)]
    pub hisense: HashMap<String, TvConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        toml::from_str(&contents).map_err(ConfigError::Parse)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [logging]
            level = "debug"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.api.is_none());
        assert!(config.integrations.hisense.is_empty());
    }

    #[test]
    fn test_parse_tv_entry() {
        let toml = r#"
            [api]
            port = 9000

            [integrations.hisense.living_room]
            host = "10.0.0.28"
            mac = "aa:bb:cc:dd:ee:ff"
            broadcast_address = "10.0.0.255"
            name = "Living Room TV"
        "#;

        let config: Config = toml::from_str(toml).unwrap();

        let api = config.api.as_ref().unwrap();
        assert_eq!(api.bind, "127.0.0.1");
        assert_eq!(api.port, 9000);

        let tv = config.integrations.hisense.get("living_room").unwrap();
        assert_eq!(tv.host, "10.0.0.28");
        assert_eq!(tv.mac, "aa:bb:cc:dd:ee:ff");
        assert_eq!(tv.broadcast_address.as_deref(), Some("10.0.0.255"));
        assert_eq!(tv.name, "Living Room TV");

        // Defaults from the integration config
        assert_eq!(tv.model, "v1");
        assert_eq!(tv.scan_interval_s, 60);
        assert_eq!(tv.ping_timeout_s, 1);
    }

    #[test]
    fn test_missing_host_is_an_error() {
        let toml = r#"
            [integrations.hisense.living_room]
            mac = "aa:bb:cc:dd:ee:ff"
        "#;

        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [logging]
            level = "warn"

            [integrations.hisense.bedroom]
            host = "192.168.1.50"
            mac = "00:11:22:33:44:55"
            "#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert_eq!(config.integrations.hisense.len(), 1);
    }

    #[test]
    fn test_from_file_missing() {
        let err = Config::from_file("/nonexistent/hisensed.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_, _)));
    }
}
