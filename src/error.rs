//! Error types for Kaftail
//!
//! This module defines the application-level error type used by the
//! command-line layer, using `thiserror` for ergonomic error handling.
//! The consumption engine carries its own taxonomy in
//! [`crate::consumer::ConsumeError`].

use thiserror::Error;

/// Main error type for Kaftail operations
///
/// Covers configuration loading and validation, plus the I/O and
/// serialization failures that can happen around it.
#[derive(Error, Debug)]
pub enum KaftailError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for Kaftail operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
