// mqtt2table-config - Runtime configuration for the sync connector
//
// Configuration is assembled in three layers:
// 1. Built-in defaults (lowest priority)
// 2. Environment variables (MQTT2TABLE_* prefix, plus the conventional
//    unprefixed MQTT_HOST / MQTT_PORT / TOPIC names)
// 3. Explicit config: a TOML file or CLI flags (highest priority)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{apply_env_overrides, EnvSource, ENV_PREFIX};
pub use sources::{load_config, load_from_file_path};

/// Main connector configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectorConfig {
    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub subscription: SubscriptionConfig,

    #[serde(default)]
    pub window: WindowConfig,

    #[serde(default)]
    pub sink: SinkConfig,

    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl ConnectorConfig {
    /// Load from default file locations and the environment.
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load from a specific file path (for the CLI `--config` flag).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Apply an explicit (file or CLI) layer on top of this config.
    pub fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        overlay.apply_to(self);
    }
}

/// Broker endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub client_id: String,
    pub keep_alive_secs: u64,
    pub connect_timeout_secs: u64,
}

impl BrokerConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            username: None,
            password: None,
            client_id: "mqtt2table".to_string(),
            keep_alive_secs: 60,
            connect_timeout_secs: 10,
        }
    }
}

/// Topic subscription configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    pub topic: String,
    /// Quality-of-service level requested from the broker: 0, 1 or 2.
    pub qos: u8,
    /// Name of the numeric field carrying the message timestamp (epoch seconds).
    pub timestamp_field: String,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            topic: "factory/demo/hello".to_string(),
            qos: 1,
            timestamp_field: "ts".to_string(),
        }
    }
}

/// Collection window bounds: the window ends when either limit is reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    pub max_wait_secs: u64,
    pub max_records: usize,
}

impl WindowConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_wait_secs: 10,
            max_records: 500,
        }
    }
}

/// Sink backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub backend: SinkBackend,
    pub destination_table: String,
    /// Directory for the jsonl backend.
    pub dir: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            backend: SinkBackend::Jsonl,
            destination_table: "hello_messages".to_string(),
            dir: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkBackend {
    Jsonl,
    Stdout,
}

impl std::fmt::Display for SinkBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkBackend::Jsonl => write!(f, "jsonl"),
            SinkBackend::Stdout => write!(f, "stdout"),
        }
    }
}

impl std::str::FromStr for SinkBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "jsonl" => Ok(SinkBackend::Jsonl),
            "stdout" => Ok(SinkBackend::Stdout),
            other => Err(anyhow::anyhow!(
                "unknown sink backend '{}' (expected 'jsonl' or 'stdout')",
                other
            )),
        }
    }
}

/// Checkpoint persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub path: String,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            path: "./checkpoint.json".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Partial configuration parsed from a file or assembled from CLI flags.
/// Only the fields it names override the layered config underneath.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverlay {
    #[serde(default)]
    pub broker: BrokerOverlay,
    #[serde(default)]
    pub subscription: SubscriptionOverlay,
    #[serde(default)]
    pub window: WindowOverlay,
    #[serde(default)]
    pub sink: SinkOverlay,
    #[serde(default)]
    pub checkpoint: CheckpointOverlay,
    #[serde(default)]
    pub log: LogOverlay,
}

impl ConfigOverlay {
    fn apply_to(self, config: &mut ConnectorConfig) {
        self.broker.apply_to(&mut config.broker);
        self.subscription.apply_to(&mut config.subscription);
        self.window.apply_to(&mut config.window);
        self.sink.apply_to(&mut config.sink);
        self.checkpoint.apply_to(&mut config.checkpoint);
        self.log.apply_to(&mut config.log);
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrokerOverlay {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub keep_alive_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
}

impl BrokerOverlay {
    fn apply_to(self, broker: &mut BrokerConfig) {
        if let Some(host) = self.host {
            broker.host = host;
        }
        if let Some(port) = self.port {
            broker.port = port;
        }
        if let Some(username) = self.username {
            broker.username = Some(username);
        }
        if let Some(password) = self.password {
            broker.password = Some(password);
        }
        if let Some(client_id) = self.client_id {
            broker.client_id = client_id;
        }
        if let Some(keep_alive_secs) = self.keep_alive_secs {
            broker.keep_alive_secs = keep_alive_secs;
        }
        if let Some(connect_timeout_secs) = self.connect_timeout_secs {
            broker.connect_timeout_secs = connect_timeout_secs;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionOverlay {
    pub topic: Option<String>,
    pub qos: Option<u8>,
    pub timestamp_field: Option<String>,
}

impl SubscriptionOverlay {
    fn apply_to(self, subscription: &mut SubscriptionConfig) {
        if let Some(topic) = self.topic {
            subscription.topic = topic;
        }
        if let Some(qos) = self.qos {
            subscription.qos = qos;
        }
        if let Some(timestamp_field) = self.timestamp_field {
            subscription.timestamp_field = timestamp_field;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindowOverlay {
    pub max_wait_secs: Option<u64>,
    pub max_records: Option<usize>,
}

impl WindowOverlay {
    fn apply_to(self, window: &mut WindowConfig) {
        if let Some(max_wait_secs) = self.max_wait_secs {
            window.max_wait_secs = max_wait_secs;
        }
        if let Some(max_records) = self.max_records {
            window.max_records = max_records;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SinkOverlay {
    pub backend: Option<SinkBackend>,
    pub destination_table: Option<String>,
    pub dir: Option<String>,
}

impl SinkOverlay {
    fn apply_to(self, sink: &mut SinkConfig) {
        if let Some(backend) = self.backend {
            sink.backend = backend;
        }
        if let Some(destination_table) = self.destination_table {
            sink.destination_table = destination_table;
        }
        if let Some(dir) = self.dir {
            sink.dir = dir;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckpointOverlay {
    pub path: Option<String>,
}

impl CheckpointOverlay {
    fn apply_to(self, checkpoint: &mut CheckpointConfig) {
        if let Some(path) = self.path {
            checkpoint.path = path;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogOverlay {
    pub level: Option<String>,
    pub format: Option<LogFormat>,
}

impl LogOverlay {
    fn apply_to(self, log: &mut LogConfig) {
        if let Some(level) = self.level {
            log.level = level;
        }
        if let Some(format) = self.format {
            log.format = format;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_expectations() {
        let config = ConnectorConfig::default();
        assert_eq!(config.broker.host, "127.0.0.1");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.subscription.topic, "factory/demo/hello");
        assert_eq!(config.subscription.qos, 1);
        assert_eq!(config.window.max_wait_secs, 10);
        assert_eq!(config.window.max_records, 500);
        assert_eq!(config.sink.backend, SinkBackend::Jsonl);
        assert_eq!(config.sink.destination_table, "hello_messages");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn overlay_overrides_only_named_fields() {
        let mut config = ConnectorConfig::default();
        config.broker.host = "broker.internal".to_string();

        let overlay: ConfigOverlay = toml::from_str(
            r#"
            [broker]
            port = 8883

            [subscription]
            topic = "factory/+/telemetry"
            "#,
        )
        .unwrap();
        config.apply_overlay(overlay);

        assert_eq!(config.broker.host, "broker.internal");
        assert_eq!(config.broker.port, 8883);
        assert_eq!(config.subscription.topic, "factory/+/telemetry");
        assert_eq!(config.subscription.qos, 1);
    }

    #[test]
    fn sink_backend_parses_case_insensitively() {
        assert_eq!("jsonl".parse::<SinkBackend>().unwrap(), SinkBackend::Jsonl);
        assert_eq!("STDOUT".parse::<SinkBackend>().unwrap(), SinkBackend::Stdout);
        assert!("parquet".parse::<SinkBackend>().is_err());
    }

    #[test]
    fn full_config_round_trips_through_toml() {
        let config = ConnectorConfig::default();
        let encoded = toml::to_string(&config).unwrap();
        let overlay: ConfigOverlay = toml::from_str(&encoded).unwrap();
        let mut rebuilt = ConnectorConfig::default();
        rebuilt.apply_overlay(overlay);
        assert_eq!(rebuilt.broker.host, config.broker.host);
        assert_eq!(rebuilt.sink.destination_table, config.sink.destination_table);
    }
}
