use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use strum_macros::Display;
use thiserror::Error;

use crate::reporter::{DEFAULT_INTERVAL_SECONDS, MAX_INTERVAL_SECONDS};
use crate::source::WatchOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub collector: CollectorConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub reporting: ReportingConfig,
    pub web: Option<WebConfig>,
    #[serde(default)]
    pub api_keys: Vec<ApiKey>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    pub url: String,
    #[serde(default = "default_timeout", deserialize_with = "human_duration")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Gpsd {
        #[serde(default = "default_gpsd_address")]
        address: String,
        #[serde(default = "default_reconnect_delay", deserialize_with = "human_duration")]
        reconnect_delay: Duration,
    },
    Push,
}

fn default_gpsd_address() -> String {
    "127.0.0.1:2947".to_string()
}

fn default_reconnect_delay() -> Duration {
    Duration::from_secs(5)
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationConfig {
    #[serde(default = "default_source")]
    pub source: SourceConfig,
    #[serde(default = "default_true")]
    pub high_accuracy: bool,
    #[serde(default = "default_distance_filter")]
    pub distance_filter_m: f64,
    #[serde(default = "default_watch_interval", deserialize_with = "human_duration")]
    pub interval: Duration,
    #[serde(default = "default_fastest_interval", deserialize_with = "human_duration")]
    pub fastest_interval: Duration,
}

impl Default for LocationConfig {
    fn default() -> Self {
        LocationConfig {
            source: default_source(),
            high_accuracy: true,
            distance_filter_m: default_distance_filter(),
            interval: default_watch_interval(),
            fastest_interval: default_fastest_interval(),
        }
    }
}

impl LocationConfig {
    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            high_accuracy: self.high_accuracy,
            distance_filter_m: self.distance_filter_m,
            interval: self.interval,
            fastest_interval: self.fastest_interval,
        }
    }
}

fn default_source() -> SourceConfig {
    SourceConfig::Gpsd {
        address: default_gpsd_address(),
        reconnect_delay: default_reconnect_delay(),
    }
}

fn default_true() -> bool {
    true
}

fn default_distance_filter() -> f64 {
    10.0
}

fn default_watch_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_fastest_interval() -> Duration {
    Duration::from_secs(5)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportingConfig {
    #[serde(default = "default_interval_seconds")]
    pub default_interval_seconds: u64,
    #[serde(default = "default_true")]
    pub autostart: bool,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        ReportingConfig {
            default_interval_seconds: DEFAULT_INTERVAL_SECONDS,
            autostart: true,
        }
    }
}

fn default_interval_seconds() -> u64 {
    DEFAULT_INTERVAL_SECONDS
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKey {
    pub key: String,
    pub name: String,
    pub permissions: HashSet<Permission>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Permission {
    Control,
    ViewStatus,
    PushLocation,
}

fn human_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn collector_url(&self) -> Result<reqwest::Url, ConfigError> {
        reqwest::Url::parse(&self.collector.url)
            .map_err(|e| ConfigError::Invalid(format!("collector.url: {}", e)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.collector_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "collector.url: unsupported scheme {}",
                url.scheme()
            )));
        }

        let interval = self.reporting.default_interval_seconds;
        if !(1..=MAX_INTERVAL_SECONDS).contains(&interval) {
            return Err(ConfigError::Invalid(format!(
                "reporting.default_interval_seconds must be between 1 and {}",
                MAX_INTERVAL_SECONDS
            )));
        }

        if self.location.fastest_interval > self.location.interval {
            return Err(ConfigError::Invalid(
                "location.fastest_interval must not exceed location.interval".to_string(),
            ));
        }

        if !self.location.distance_filter_m.is_finite() || self.location.distance_filter_m < 0.0 {
            return Err(ConfigError::Invalid(
                "location.distance_filter_m must be a non-negative number".to_string(),
            ));
        }

        Ok(())
    }

    pub fn find_api_key(&self, key: &str) -> Option<&ApiKey> {
        self.api_keys.iter().find(|k| k.key == key)
    }

    /// Whether any client can reach the push endpoint at all.
    pub fn accepts_pushed_locations(&self) -> bool {
        self.web.is_some()
            && self
                .api_keys
                .iter()
                .any(|k| k.permissions.contains(&Permission::PushLocation))
    }
}
