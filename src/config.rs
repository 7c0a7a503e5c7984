//! Configuration management for Kaftail
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::consumer::{SaslMechanism, SecurityProtocol};
use crate::decode::Encoding;
use crate::error::{KaftailError, Result};
use crate::output::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for Kaftail
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Kafka connection settings
    #[serde(default)]
    pub kafka: KafkaConfig,

    /// Defaults for the consume command
    #[serde(default)]
    pub consume: ConsumeDefaults,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Kafka connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    /// Kafka brokers (comma-separated)
    #[serde(default = "default_brokers")]
    pub brokers: String,

    /// Client id reported to the brokers
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Timeout for metadata and watermark queries, in seconds
    #[serde(default = "default_metadata_timeout")]
    pub metadata_timeout_secs: u64,

    /// Security configuration
    #[serde(default)]
    pub security: Option<KafkaSecurityConfig>,
}

/// Kafka security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaSecurityConfig {
    /// Security protocol (PLAINTEXT, SSL, SASL_PLAINTEXT, SASL_SSL)
    pub protocol: String,

    /// SASL mechanism (PLAIN, SCRAM-SHA-256, SCRAM-SHA-512)
    #[serde(default)]
    pub sasl_mechanism: Option<String>,

    /// SASL username
    #[serde(default)]
    pub sasl_username: Option<String>,

    /// SASL password (prefer env var KAFKA_SASL_PASSWORD)
    #[serde(default)]
    pub sasl_password: Option<String>,

    /// CA certificate file
    #[serde(default)]
    pub ssl_ca_location: Option<String>,

    /// Client certificate file
    #[serde(default)]
    pub ssl_certificate_location: Option<String>,

    /// Client key file
    #[serde(default)]
    pub ssl_key_location: Option<String>,
}

/// Defaults for the consume command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumeDefaults {
    /// Seconds without messages after which a bounded run stops a partition
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Encoding for keys no deserializer claims
    #[serde(default)]
    pub key_encoding: Encoding,

    /// Encoding for values no deserializer claims
    #[serde(default)]
    pub value_encoding: Encoding,

    /// Output layout
    #[serde(default)]
    pub output: OutputFormat,

    /// Pretty-print JSON values
    #[serde(default = "default_format_json")]
    pub format_json: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Enable JSON-formatted logs
    #[serde(default)]
    pub json_format: bool,

    /// Log file path (if None, STDERR only)
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

fn default_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_client_id() -> String {
    "kaftail".to_string()
}

fn default_metadata_timeout() -> u64 {
    10
}

fn default_idle_timeout() -> u64 {
    5
}

fn default_format_json() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            client_id: default_client_id(),
            metadata_timeout_secs: default_metadata_timeout(),
            security: None,
        }
    }
}

impl Default for ConsumeDefaults {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            key_encoding: Encoding::default(),
            value_encoding: Encoding::default(),
            output: OutputFormat::default(),
            format_json: default_format_json(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
        }
    }
}

impl ConsumeDefaults {
    /// Idle window as a duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| KaftailError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| KaftailError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(brokers) = std::env::var("KAFTAIL_BROKERS") {
            self.kafka.brokers = brokers;
        }

        if let Ok(client_id) = std::env::var("KAFTAIL_CLIENT_ID") {
            self.kafka.client_id = client_id;
        }

        if let Ok(timeout) = std::env::var("KAFTAIL_IDLE_TIMEOUT") {
            if let Ok(value) = timeout.parse() {
                self.consume.idle_timeout_secs = value;
            } else {
                tracing::warn!("Invalid KAFTAIL_IDLE_TIMEOUT: {}", timeout);
            }
        }

        if let Ok(level) = std::env::var("KAFTAIL_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(json) = std::env::var("KAFTAIL_JSON_LOGS") {
            match json.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.logging.json_format = true,
                "0" | "false" | "no" => self.logging.json_format = false,
                _ => tracing::warn!("Invalid KAFTAIL_JSON_LOGS: {}", json),
            }
        }

        if let Ok(file) = std::env::var("KAFTAIL_LOG_FILE") {
            self.logging.file_path = Some(PathBuf::from(file));
        }

        // Security overrides create the section on demand
        let protocol = std::env::var("KAFTAIL_SECURITY_PROTOCOL").ok();
        let mechanism = std::env::var("KAFTAIL_SASL_MECHANISM").ok();
        let username = std::env::var("KAFTAIL_SASL_USERNAME").ok();
        let password = std::env::var("KAFTAIL_SASL_PASSWORD").ok();

        if protocol.is_some() || mechanism.is_some() || username.is_some() || password.is_some() {
            let security = self
                .kafka
                .security
                .get_or_insert_with(|| KafkaSecurityConfig {
                    protocol: "PLAINTEXT".to_string(),
                    sasl_mechanism: None,
                    sasl_username: None,
                    sasl_password: None,
                    ssl_ca_location: None,
                    ssl_certificate_location: None,
                    ssl_key_location: None,
                });

            if let Some(protocol) = protocol {
                security.protocol = protocol;
            }
            if mechanism.is_some() {
                security.sasl_mechanism = mechanism;
            }
            if username.is_some() {
                security.sasl_username = username;
            }
            if password.is_some() {
                security.sasl_password = password;
            }
            tracing::debug!("Applied KAFTAIL_* security overrides");
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(brokers) = &cli.brokers {
            self.kafka.brokers = brokers.clone();
        }

        if cli.verbose {
            self.logging.level = "debug".to_string();
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.kafka.brokers.trim().is_empty() {
            return Err(KaftailError::Config("kafka.brokers cannot be empty".to_string()).into());
        }

        if self.kafka.metadata_timeout_secs == 0 {
            return Err(KaftailError::Config(
                "kafka.metadata_timeout_secs must be greater than 0".to_string(),
            )
            .into());
        }

        if self.consume.idle_timeout_secs == 0 {
            return Err(KaftailError::Config(
                "consume.idle_timeout_secs must be greater than 0".to_string(),
            )
            .into());
        }

        if let Some(security) = &self.kafka.security {
            SecurityProtocol::parse(&security.protocol)
                .map_err(|e| KaftailError::Config(e.to_string()))?;

            if let Some(mechanism) = &security.sasl_mechanism {
                SaslMechanism::parse(mechanism).map_err(|e| KaftailError::Config(e.to_string()))?;

                if security.sasl_username.as_deref().unwrap_or("").is_empty() {
                    return Err(KaftailError::Config(
                        "kafka.security.sasl_username is required when a SASL mechanism is set"
                            .to_string(),
                    )
                    .into());
                }
            }
        }

        Ok(())
    }
}
