//! Kafka client configuration.
//!
//! Translates the `kafka` section of the application configuration into the
//! key-value settings librdkafka understands, including SASL and TLS.
//!
//! # Example
//!
//! ```rust
//! use kaftail::consumer::config::KafkaClientConfig;
//!
//! let config = KafkaClientConfig::new("localhost:9092", "kaftail")
//!     .with_sasl_scram_sha256("username", "password");
//! assert!(config
//!     .settings()
//!     .contains(&("sasl.username".to_string(), "username".to_string())));
//! ```

use std::time::Duration;
use thiserror::Error;

use crate::config::KafkaConfig;

/// Errors that can occur while building the client configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Missing required configuration value.
    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    /// Invalid security protocol specified.
    #[error("Invalid security protocol: {0}")]
    InvalidSecurityProtocol(String),

    /// Invalid SASL mechanism specified.
    #[error("Invalid SASL mechanism: {0}")]
    InvalidSaslMechanism(String),
}

/// Security protocol for Kafka connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SecurityProtocol {
    /// No encryption or authentication.
    #[default]
    Plaintext,
    /// TLS encryption without SASL.
    Ssl,
    /// SASL authentication without TLS.
    SaslPlaintext,
    /// SASL authentication with TLS encryption.
    SaslSsl,
}

impl SecurityProtocol {
    /// Returns the Kafka configuration string for this protocol.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plaintext => "PLAINTEXT",
            Self::Ssl => "SSL",
            Self::SaslPlaintext => "SASL_PLAINTEXT",
            Self::SaslSsl => "SASL_SSL",
        }
    }

    /// Parses a protocol name, ignoring case.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_uppercase().as_str() {
            "PLAINTEXT" => Ok(Self::Plaintext),
            "SSL" => Ok(Self::Ssl),
            "SASL_PLAINTEXT" => Ok(Self::SaslPlaintext),
            "SASL_SSL" => Ok(Self::SaslSsl),
            _ => Err(ConfigError::InvalidSecurityProtocol(value.to_string())),
        }
    }
}

/// SASL authentication mechanism.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SaslMechanism {
    /// PLAIN mechanism (username/password in clear text).
    Plain,
    /// SCRAM-SHA-256 mechanism.
    #[default]
    ScramSha256,
    /// SCRAM-SHA-512 mechanism.
    ScramSha512,
}

impl SaslMechanism {
    /// Returns the Kafka configuration string for this mechanism.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::ScramSha256 => "SCRAM-SHA-256",
            Self::ScramSha512 => "SCRAM-SHA-512",
        }
    }

    /// Parses a mechanism name, ignoring case.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_uppercase().as_str() {
            "PLAIN" => Ok(Self::Plain),
            "SCRAM-SHA-256" => Ok(Self::ScramSha256),
            "SCRAM-SHA-512" => Ok(Self::ScramSha512),
            _ => Err(ConfigError::InvalidSaslMechanism(value.to_string())),
        }
    }
}

/// SASL authentication configuration.
#[derive(Debug, Clone)]
pub struct SaslConfig {
    /// Authentication mechanism to use.
    pub mechanism: SaslMechanism,
    /// SASL username.
    pub username: String,
    /// SASL password.
    pub password: String,
}

/// SSL/TLS configuration.
#[derive(Debug, Clone, Default)]
pub struct SslConfig {
    /// Path to CA certificate file.
    pub ca_location: Option<String>,
    /// Path to client certificate file (for mTLS).
    pub certificate_location: Option<String>,
    /// Path to client key file (for mTLS).
    pub key_location: Option<String>,
}

/// Connection settings shared by the metadata client and partition readers.
#[derive(Debug, Clone)]
pub struct KafkaClientConfig {
    /// Kafka broker addresses (comma-separated).
    pub brokers: String,

    /// Client identifier reported to the brokers.
    pub client_id: String,

    /// Security protocol for the connection.
    pub security_protocol: SecurityProtocol,

    /// SASL configuration (required for SASL protocols).
    pub sasl_config: Option<SaslConfig>,

    /// SSL configuration.
    pub ssl_config: Option<SslConfig>,

    /// Timeout for metadata and watermark queries.
    pub metadata_timeout: Duration,
}

impl KafkaClientConfig {
    /// Creates a plaintext configuration with a 10 second metadata timeout.
    pub fn new(brokers: &str, client_id: &str) -> Self {
        Self {
            brokers: brokers.to_string(),
            client_id: client_id.to_string(),
            security_protocol: SecurityProtocol::default(),
            sasl_config: None,
            ssl_config: None,
            metadata_timeout: Duration::from_secs(10),
        }
    }

    /// Builds the client configuration from the application configuration.
    ///
    /// The SASL password falls back to the `KAFKA_SASL_PASSWORD` environment
    /// variable when the configuration does not carry one.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidSecurityProtocol` or
    /// `ConfigError::InvalidSaslMechanism` for unknown names, and
    /// `ConfigError::MissingConfig` when SASL credentials are incomplete.
    pub fn from_config(kafka: &KafkaConfig) -> Result<Self, ConfigError> {
        let mut config = Self::new(&kafka.brokers, &kafka.client_id)
            .with_metadata_timeout(Duration::from_secs(kafka.metadata_timeout_secs));

        let Some(security) = &kafka.security else {
            return Ok(config);
        };

        config.security_protocol = SecurityProtocol::parse(&security.protocol)?;

        if let Some(mechanism) = &security.sasl_mechanism {
            let username = security.sasl_username.clone().ok_or_else(|| {
                ConfigError::MissingConfig("kafka.security.sasl_username".to_string())
            })?;
            let password = security
                .sasl_password
                .clone()
                .or_else(|| std::env::var("KAFKA_SASL_PASSWORD").ok())
                .ok_or_else(|| {
                    ConfigError::MissingConfig(
                        "kafka.security.sasl_password (or KAFKA_SASL_PASSWORD)".to_string(),
                    )
                })?;

            config.sasl_config = Some(SaslConfig {
                mechanism: SaslMechanism::parse(mechanism)?,
                username,
                password,
            });
        }

        if security.ssl_ca_location.is_some()
            || security.ssl_certificate_location.is_some()
            || security.ssl_key_location.is_some()
        {
            config.ssl_config = Some(SslConfig {
                ca_location: security.ssl_ca_location.clone(),
                certificate_location: security.ssl_certificate_location.clone(),
                key_location: security.ssl_key_location.clone(),
            });
        }

        Ok(config)
    }

    /// Sets the metadata query timeout.
    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    /// Configures SASL/SCRAM-SHA-256 authentication over TLS.
    pub fn with_sasl_scram_sha256(mut self, username: &str, password: &str) -> Self {
        self.security_protocol = SecurityProtocol::SaslSsl;
        self.sasl_config = Some(SaslConfig {
            mechanism: SaslMechanism::ScramSha256,
            username: username.to_string(),
            password: password.to_string(),
        });
        self
    }

    /// Configures TLS with a CA certificate.
    pub fn with_ssl(mut self, ca_location: &str) -> Self {
        self.ssl_config = Some(SslConfig {
            ca_location: Some(ca_location.to_string()),
            ..SslConfig::default()
        });
        self
    }

    /// Returns the librdkafka settings as key-value pairs.
    ///
    /// Readers are assigned partitions manually and never commit, so offset
    /// storage and partition EOF events are turned off.
    pub fn settings(&self) -> Vec<(String, String)> {
        let mut settings = vec![
            ("bootstrap.servers".to_string(), self.brokers.clone()),
            ("client.id".to_string(), self.client_id.clone()),
            ("group.id".to_string(), format!("{}-reader", self.client_id)),
            ("enable.auto.commit".to_string(), "false".to_string()),
            ("enable.auto.offset.store".to_string(), "false".to_string()),
            ("enable.partition.eof".to_string(), "false".to_string()),
            (
                "security.protocol".to_string(),
                self.security_protocol.as_str().to_string(),
            ),
        ];

        if let Some(sasl) = &self.sasl_config {
            settings.push((
                "sasl.mechanism".to_string(),
                sasl.mechanism.as_str().to_string(),
            ));
            settings.push(("sasl.username".to_string(), sasl.username.clone()));
            settings.push(("sasl.password".to_string(), sasl.password.clone()));
        }

        if let Some(ssl) = &self.ssl_config {
            if let Some(ca) = &ssl.ca_location {
                settings.push(("ssl.ca.location".to_string(), ca.clone()));
            }
            if let Some(cert) = &ssl.certificate_location {
                settings.push(("ssl.certificate.location".to_string(), cert.clone()));
            }
            if let Some(key) = &ssl.key_location {
                settings.push(("ssl.key.location".to_string(), key.clone()));
            }
        }

        settings
    }

    /// Builds an rdkafka `ClientConfig` from [`settings`](Self::settings).
    pub fn client_config(&self) -> rdkafka::ClientConfig {
        let mut client_config = rdkafka::ClientConfig::new();
        for (key, value) in self.settings() {
            client_config.set(key, value);
        }
        client_config
    }
}
