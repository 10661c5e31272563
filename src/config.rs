use rdkafka::config::ClientConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Configuration
// ============================================================================
//
// Built once at startup and handed to the components that need it:
// - Broker connection from the environment (KAFKA_BROKERS is mandatory)
// - Channel names and consumer tuning from a TOML properties file, where
//   channels are looked up by `order.topic`, `ordercommand.topic` and
//   `error.topic`
//
// ============================================================================

pub const CONFIG_PATH_ENV: &str = "APP_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/application.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    MissingEnv(&'static str),

    #[error("Failed to read config file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub kafka: KafkaSettings,
    pub consumer: ConsumerSettings,
    pub topics: TopicSettings,
    pub metrics: MetricsSettings,
}

impl AppConfig {
    /// Load from the process environment and the properties file named by
    /// `APP_CONFIG` (default `config/application.toml`).
    pub fn load() -> Result<Self, ConfigError> {
        let kafka = KafkaSettings::from_env()?;
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_file(kafka, path)
    }

    pub fn load_file<P: AsRef<Path>>(kafka: KafkaSettings, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_properties(kafka, &content)
    }

    pub fn from_properties(kafka: KafkaSettings, properties: &str) -> Result<Self, ConfigError> {
        let file: PropertiesFile = toml::from_str(properties)?;

        let config = Self {
            kafka,
            consumer: file.consumer,
            topics: TopicSettings {
                order: file.order.topic,
                order_command: file.ordercommand.topic,
                error: file.error.topic,
            },
            metrics: file.metrics,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let topics = [
            ("order.topic", &self.topics.order),
            ("ordercommand.topic", &self.topics.order_command),
            ("error.topic", &self.topics.error),
        ];
        for (field, topic) in topics {
            if topic.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "topic name cannot be empty".into(),
                });
            }
        }

        if self.consumer.group_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "consumer.group_id",
                reason: "cannot be empty".into(),
            });
        }
        if self.consumer.poll_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "consumer.poll_timeout_ms",
                reason: "must be greater than zero".into(),
            });
        }
        if self.consumer.max_poll_records == 0 {
            return Err(ConfigError::InvalidValue {
                field: "consumer.max_poll_records",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct PropertiesFile {
    order: TopicEntry,
    ordercommand: TopicEntry,
    error: TopicEntry,
    #[serde(default)]
    consumer: ConsumerSettings,
    #[serde(default)]
    metrics: MetricsSettings,
}

#[derive(Debug, Deserialize)]
struct TopicEntry {
    topic: String,
}

/// Channel names; only `order` is consumed by this agent
#[derive(Debug, Clone, PartialEq)]
pub struct TopicSettings {
    pub order: String,
    pub order_command: String,
    pub error: String,
}

// ============================================================================
// Broker connection
// ============================================================================

#[derive(Debug, Clone)]
pub struct KafkaSettings {
    pub brokers: String,
    pub api_key: Option<String>,
    /// PEM CA bundle used when the truststore is enabled
    pub ca_location: Option<String>,
}

impl KafkaSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let brokers = non_empty("KAFKA_BROKERS").ok_or(ConfigError::MissingEnv("KAFKA_BROKERS"))?;
        let api_key = non_empty("KAFKA_APIKEY");

        // Truststore only matters for the SASL_SSL connection
        let truststore_enabled = api_key.is_some() && non_empty("TRUSTSTORE_ENABLED").as_deref() == Some("true");
        let ca_location = if truststore_enabled {
            Some(non_empty("TRUSTSTORE_PATH").ok_or(ConfigError::MissingEnv("TRUSTSTORE_PATH"))?)
        } else {
            None
        };

        Ok(Self {
            brokers,
            api_key,
            ca_location,
        })
    }

    /// Settings shared by every client of the cluster
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config.set("bootstrap.servers", &self.brokers);

        if let Some(api_key) = &self.api_key {
            config
                .set("security.protocol", "SASL_SSL")
                .set("sasl.mechanisms", "PLAIN")
                .set("sasl.username", "token")
                .set("sasl.password", api_key)
                .set("ssl.endpoint.identification.algorithm", "https");

            if let Some(ca_location) = &self.ca_location {
                config.set("ssl.ca.location", ca_location);
            }
        }

        config
    }
}

// ============================================================================
// Consumer
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Periodic background commit by the client
    Auto,
    /// Commit each message once the loop has settled it
    AfterDispatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetReset {
    Earliest,
    Latest,
}

impl OffsetReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            OffsetReset::Earliest => "earliest",
            OffsetReset::Latest => "latest",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConsumerSettings {
    pub group_id: String,
    pub client_id: String,
    pub commit_policy: CommitPolicy,
    pub auto_offset_reset: OffsetReset,
    pub poll_timeout_ms: u64,
    pub close_timeout_ms: u64,
    /// Upper bound on messages handed to the loop per poll
    pub max_poll_records: usize,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            group_id: "ordercmd-event-consumer-grp".to_string(),
            client_id: "OrderEventAgent".to_string(),
            commit_policy: CommitPolicy::Auto,
            auto_offset_reset: OffsetReset::Earliest,
            poll_timeout_ms: 10_000,
            close_timeout_ms: 10_000,
            max_poll_records: 500,
        }
    }
}

impl ConsumerSettings {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    pub fn client_config(&self, kafka: &KafkaSettings) -> ClientConfig {
        let mut config = kafka.client_config();
        config
            .set("group.id", &self.group_id)
            .set("client.id", &self.client_id)
            .set("enable.auto.commit", (self.commit_policy == CommitPolicy::Auto).to_string())
            .set("auto.offset.reset", self.auto_offset_reset.as_str());
        config
    }
}

// ============================================================================
// Metrics endpoint
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 9090,
        }
    }
}
