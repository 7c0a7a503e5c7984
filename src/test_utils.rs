//! Test utilities for Kaftail
//!
//! This module provides common test utilities including temporary directory
//! management, test file creation, and assertion helpers.

use crate::consumer::ConsumedMessage;
use std::fmt::Display;
use std::path::PathBuf;
use tempfile::TempDir;

/// Create a temporary directory for testing
///
/// # Returns
///
/// Returns a TempDir that will be cleaned up when dropped
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Create a test file with the given content
///
/// # Panics
///
/// Panics if file creation or writing fails
pub fn create_test_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T, E: Display>(result: Result<T, E>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = e.to_string();
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

/// Create a test configuration YAML string
pub fn test_config_yaml() -> String {
    r#"
kafka:
  brokers: "broker-1:9092,broker-2:9092"
  client_id: kaftail-test
  metadata_timeout_secs: 3
  security:
    protocol: SASL_SSL
    sasl_mechanism: SCRAM-SHA-256
    sasl_username: reader
    ssl_ca_location: /etc/kafka/ca.pem

consume:
  idle_timeout_secs: 12
  key_encoding: raw
  value_encoding: hex
  output: json
  format_json: false

logging:
  level: info
  json_format: true
"#
    .to_string()
}

/// Messages at the given `(offset, timestamp_millis)` positions of one partition
pub fn messages_at(partition: i32, positions: &[(i64, i64)]) -> Vec<ConsumedMessage> {
    positions
        .iter()
        .map(|(offset, millis)| {
            ConsumedMessage::new(partition, *offset)
                .with_timestamp_millis(*millis)
                .with_value(format!("p{}-o{}", partition, offset))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::KaftailError;

    #[test]
    fn test_temp_dir_creation() {
        let dir = temp_dir();
        assert!(dir.path().exists());
    }

    #[test]
    fn test_create_test_file() {
        let dir = temp_dir();
        let path = create_test_file(&dir, "test.txt", "content");
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "content");
    }

    #[test]
    fn test_assert_error_contains_success() {
        let result: Result<(), KaftailError> =
            Err(KaftailError::Config("test error message".to_string()));
        assert_error_contains(result, "test error");
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_ok() {
        let result: Result<(), KaftailError> = Ok(());
        assert_error_contains(result, "error");
    }

    #[test]
    fn test_test_config_yaml() {
        let config: Config = serde_yaml::from_str(&test_config_yaml()).unwrap();
        assert_eq!(config.kafka.client_id, "kaftail-test");
        assert!(!config.consume.format_json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_messages_at() {
        let messages = messages_at(2, &[(5, 100), (6, 200)]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].offset, 6);
        assert_eq!(messages[1].value.as_deref(), Some(b"p2-o6".as_slice()));
    }
}
