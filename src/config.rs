//! Service configuration
//!
//! Loaded once from `config.yaml` at startup. Every field has a default so a
//! missing file still yields a runnable service. `CUSTOMER_CODE`, `PORT` and
//! `LOG_LEVEL` override the file.

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    /// Selects `{config_dir}/{customer_code}/layout.json` and the customer logo.
    pub customer_code: String,
    pub paths: PathsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Holds `layout.json`, `logos/` and `positions/`.
    pub config_dir: PathBuf,
    /// Sample request used by the development endpoint.
    pub sample_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api: ApiConfig::default(),
            customer_code: "DEV".to_string(),
            paths: PathsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            config_dir: PathBuf::from("config"),
            sample_dir: PathBuf::from("tests/fixtures"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    pub fn positions_dir(&self) -> PathBuf {
        self.paths.config_dir.join("positions")
    }

    pub fn logos_dir(&self) -> PathBuf {
        self.paths.config_dir.join("logos")
    }

    /// Customer layout first, shared layout second.
    pub fn layout_candidates(&self) -> [PathBuf; 2] {
        [
            self.paths
                .config_dir
                .join(&self.customer_code)
                .join("layout.json"),
            self.paths.config_dir.join("layout.json"),
        ]
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(code) = std::env::var("CUSTOMER_CODE") {
            self.customer_code = code;
        }
        if let Ok(port) = std::env::var("PORT") {
            self.api.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidValue(format!("PORT={}", port)))?;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(serde_yaml::Error),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "Failed to read config: {}", err),
            ConfigError::Parse(err) => write!(f, "Failed to parse config: {}", err),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load the service configuration, falling back to defaults when the file is absent.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let mut config = match fs::read_to_string(path) {
        Ok(text) => parse_config(&text)?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => Config::default(),
        Err(err) => return Err(ConfigError::Io(err)),
    };
    config.apply_env_overrides()?;
    Ok(config)
}

pub fn parse_config(text: &str) -> Result<Config, ConfigError> {
    serde_yaml::from_str(text).map_err(ConfigError::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = parse_config("api:\n  port: 8080\ncustomer_code: OUH\n").unwrap();
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.customer_code, "OUH");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn customer_layout_is_tried_first() {
        let config = parse_config("customer_code: OUH\npaths:\n  config_dir: cfg\n").unwrap();
        let [customer, shared] = config.layout_candidates();
        assert_eq!(customer, PathBuf::from("cfg/OUH/layout.json"));
        assert_eq!(shared, PathBuf::from("cfg/layout.json"));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(matches!(parse_config("api: [1, 2"), Err(ConfigError::Parse(_))));
    }
}
