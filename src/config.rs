//! Configuration management
//!
//! TOML file support with serde defaults and `INSIGHTS_*` environment
//! variable overrides. Every section may be omitted from the file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Error;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Remote time-series store connection
    #[serde(default)]
    pub store: StoreConfig,

    /// Batched query tuning
    #[serde(default)]
    pub query: QueryConfig,

    /// Business rules applied by the insights service
    #[serde(default)]
    pub insights: InsightsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// CORS allowed origins (empty = allow all)
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

/// Remote store connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Base URL of the time-series API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Batched query tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    /// Maximum query items per remote multi-datapoint request
    #[serde(default = "default_max_items_per_request")]
    pub max_items_per_request: usize,

    /// Maximum chunk requests in flight at once
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,

    /// Maximum descriptor lookups in flight at once
    #[serde(default = "default_lookup_concurrency")]
    pub descriptor_lookup_concurrency: usize,

    /// Deadline for a whole pipeline call in seconds (0 = none)
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

/// Business rules applied by the insights service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InsightsConfig {
    /// Series description selecting CO2 measurements
    #[serde(default = "default_measurement_description")]
    pub measurement_description: String,

    /// Rows whose `robot_name` equals this value are dropped before listing
    /// and aggregation
    #[serde(default)]
    pub excluded_robot_name: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8200
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_base_url() -> String {
    "http://127.0.0.1:5001".to_string()
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_max_items_per_request() -> usize {
    100
}
fn default_max_concurrent_batches() -> usize {
    4
}
fn default_lookup_concurrency() -> usize {
    8
}
fn default_deadline_secs() -> u64 {
    60
}
fn default_measurement_description() -> String {
    "CO2Measurement".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_items_per_request: default_max_items_per_request(),
            max_concurrent_batches: default_max_concurrent_batches(),
            descriptor_lookup_concurrency: default_lookup_concurrency(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

impl QueryConfig {
    /// Pipeline deadline, `None` when disabled
    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_secs > 0).then(|| Duration::from_secs(self.deadline_secs))
    }
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            measurement_description: default_measurement_description(),
            excluded_robot_name: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        toml::from_str(&contents).map_err(|e| {
            Error::Configuration(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Self, Error> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Resolve configuration for the server
    ///
    /// Priority:
    /// 1. explicit path
    /// 2. `INSIGHTS_CONFIG` environment variable
    /// 3. `application.toml` in the working directory
    /// 4. defaults
    ///
    /// Environment overrides are applied on top in every case.
    pub fn load(explicit: Option<&Path>) -> Result<Self, Error> {
        if let Some(path) = explicit {
            return Self::from_file_with_env(path);
        }
        if let Ok(path) = std::env::var("INSIGHTS_CONFIG") {
            return Self::from_file_with_env(path);
        }
        let local = Path::new("application.toml");
        if local.exists() {
            return Self::from_file_with_env(local);
        }
        Ok(Self::from_env())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        // Server
        if let Ok(host) = std::env::var("INSIGHTS_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("INSIGHTS_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        // Store
        if let Ok(url) = std::env::var("INSIGHTS_STORE_URL") {
            self.store.base_url = url;
        }
        if let Ok(timeout) = std::env::var("INSIGHTS_STORE_TIMEOUT_SECS") {
            if let Ok(t) = timeout.parse() {
                self.store.request_timeout_secs = t;
            }
        }

        // Query
        if let Ok(cap) = std::env::var("INSIGHTS_MAX_ITEMS_PER_REQUEST") {
            if let Ok(c) = cap.parse() {
                self.query.max_items_per_request = c;
            }
        }

        // Insights
        if let Ok(robot) = std::env::var("INSIGHTS_EXCLUDED_ROBOT_NAME") {
            self.insights.excluded_robot_name = (!robot.is_empty()).then_some(robot);
        }

        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.server.log_level = log_level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), Error> {
        if self.server.port == 0 {
            return Err(Error::Configuration("Server port cannot be 0".to_string()));
        }
        if url::Url::parse(&self.store.base_url).is_err() {
            return Err(Error::Configuration(format!(
                "Store base URL is not a valid URL: {}",
                self.store.base_url
            )));
        }
        if self.store.request_timeout_secs == 0 {
            return Err(Error::Configuration(
                "Store request timeout must be > 0".to_string(),
            ));
        }
        if self.query.max_items_per_request == 0 {
            return Err(Error::Configuration(
                "Max items per request must be > 0".to_string(),
            ));
        }
        if self.query.max_concurrent_batches == 0 {
            return Err(Error::Configuration(
                "Max concurrent batches must be > 0".to_string(),
            ));
        }
        if self.query.descriptor_lookup_concurrency == 0 {
            return Err(Error::Configuration(
                "Descriptor lookup concurrency must be > 0".to_string(),
            ));
        }
        if self.insights.measurement_description.is_empty() {
            return Err(Error::Configuration(
                "Measurement description cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Listen address as `host:port`
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8200);
        assert_eq!(config.query.max_items_per_request, 100);
        assert_eq!(config.insights.measurement_description, "CO2Measurement");
        assert!(config.insights.excluded_robot_name.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_cap_rejected() {
        let mut config = Config::default();
        config.query.max_items_per_request = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let mut config = Config::default();
        config.store.base_url = "not a url".to_string();
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[store]
base_url = "https://timeseries.example.com/v1"

[insights]
excluded_robot_name = "NLSBot"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.store.base_url, "https://timeseries.example.com/v1");
        assert_eq!(config.store.request_timeout_secs, 10);
        assert_eq!(config.query.max_items_per_request, 100);
        assert_eq!(
            config.insights.excluded_robot_name.as_deref(),
            Some("NLSBot")
        );
    }

    #[test]
    fn test_example_file_parses() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/application.example.toml");
        let config = Config::from_file(path).unwrap();
        assert_eq!(config.query.deadline_secs, 60);
        assert!(config.insights.excluded_robot_name.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = Config::from_file("/nonexistent/insights.toml").unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn test_deadline_disabled_at_zero() {
        let mut config = QueryConfig::default();
        assert_eq!(config.deadline(), Some(Duration::from_secs(60)));
        config.deadline_secs = 0;
        assert!(config.deadline().is_none());
    }
}
