//! Deserializer chain.
//!
//! Each key and value payload is offered to the configured deserializers in
//! order. The first one that claims the payload owns the outcome: if it fails,
//! the payload is not retried against later entries. A chain always ends in a
//! [`RawDeserializer`] that cannot fail.
//!
//! # Example
//!
//! ```rust
//! use kaftail::consumer::ConsumedMessage;
//! use kaftail::decode::{DeserializerChain, Encoding};
//!
//! let chain = DeserializerChain::standard(true, Encoding::Raw, Encoding::Hex);
//! let message = ConsumedMessage::new(0, 7)
//!     .with_key("user-1")
//!     .with_value(vec![0xde, 0xad]);
//!
//! let record = chain.deserialize(&message).unwrap();
//! assert_eq!(record.key.as_deref(), Some("user-1"));
//! assert_eq!(record.value.as_deref(), Some("dead"));
//! ```

pub mod json;
pub mod raw;

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consumer::ConsumedMessage;
use crate::output::{Record, RecordHeader};

pub use json::JsonDeserializer;
pub use raw::RawDeserializer;

/// Text encoding applied by the raw fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Lossy UTF-8
    #[default]
    Raw,
    /// Lowercase hexadecimal
    Hex,
    /// Standard base64 with padding
    Base64,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Raw => write!(f, "raw"),
            Encoding::Hex => write!(f, "hex"),
            Encoding::Base64 => write!(f, "base64"),
        }
    }
}

/// Part of a message a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Message key
    Key,
    /// Message value
    Value,
}

/// Failure of a deserializer that accepted a payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{deserializer} deserializer: {message}")]
pub struct DecodeError {
    /// Name of the deserializer that failed
    pub deserializer: String,
    /// What went wrong
    pub message: String,
}

impl DecodeError {
    /// Creates a decode error attributed to `deserializer`.
    pub fn new(deserializer: &str, message: impl Into<String>) -> Self {
        Self {
            deserializer: deserializer.to_string(),
            message: message.into(),
        }
    }
}

/// A payload codec that can take part in a [`DeserializerChain`].
///
/// Construction should acquire everything the codec needs so that failures
/// surface before the first message is processed.
pub trait Deserializer: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Returns true if this deserializer claims the payload.
    fn applies_to(&self, field: Field, payload: &[u8]) -> bool;

    /// Renders a claimed payload as text.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if the payload is malformed for this format.
    fn deserialize(&self, field: Field, payload: &[u8]) -> Result<String, DecodeError>;
}

/// Ordered list of deserializers with a raw fallback per field.
pub struct DeserializerChain {
    deserializers: Vec<Box<dyn Deserializer>>,
    key_fallback: RawDeserializer,
    value_fallback: RawDeserializer,
}

impl DeserializerChain {
    /// Creates a chain that tries `deserializers` in order before falling
    /// back to raw output with the given encodings.
    pub fn new(
        deserializers: Vec<Box<dyn Deserializer>>,
        key_encoding: Encoding,
        value_encoding: Encoding,
    ) -> Self {
        Self {
            deserializers,
            key_fallback: RawDeserializer::new(key_encoding),
            value_fallback: RawDeserializer::new(value_encoding),
        }
    }

    /// Creates the chain used by the command line: optional JSON
    /// pretty-printing, then raw output.
    ///
    /// JSON pretty-printing only applies to raw values; a hex or base64
    /// value encoding always wins.
    pub fn standard(format_json: bool, key_encoding: Encoding, value_encoding: Encoding) -> Self {
        let mut deserializers: Vec<Box<dyn Deserializer>> = Vec::new();
        if format_json && value_encoding == Encoding::Raw {
            deserializers.push(Box::new(JsonDeserializer::new()));
        }
        Self::new(deserializers, key_encoding, value_encoding)
    }

    /// Names of the configured deserializers, fallback excluded.
    pub fn names(&self) -> Vec<&str> {
        self.deserializers.iter().map(|d| d.name()).collect()
    }

    /// Decodes a single payload.
    ///
    /// # Errors
    ///
    /// Returns the error of the first deserializer that claimed the payload.
    pub fn decode(&self, field: Field, payload: &[u8]) -> Result<String, DecodeError> {
        for deserializer in &self.deserializers {
            if deserializer.applies_to(field, payload) {
                return deserializer.deserialize(field, payload);
            }
        }

        let fallback = match field {
            Field::Key => &self.key_fallback,
            Field::Value => &self.value_fallback,
        };
        Ok(fallback.encode(payload))
    }

    /// Formats a consumed message into a [`Record`].
    ///
    /// Key and value are decoded independently; headers always go through
    /// the raw fallback of the value.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if the key or value could not be decoded.
    pub fn deserialize(&self, message: &ConsumedMessage) -> Result<Record, DecodeError> {
        let key = message
            .key
            .as_deref()
            .map(|payload| self.decode(Field::Key, payload))
            .transpose()?;
        let value = message
            .value
            .as_deref()
            .map(|payload| self.decode(Field::Value, payload))
            .transpose()?;
        let headers = message
            .headers
            .iter()
            .map(|(name, payload)| RecordHeader {
                key: name.clone(),
                value: self.value_fallback.encode(payload),
            })
            .collect();

        Ok(Record {
            partition: message.partition,
            offset: message.offset,
            timestamp: message.timestamp,
            key,
            value,
            headers,
        })
    }
}

impl fmt::Debug for DeserializerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeserializerChain")
            .field("deserializers", &self.names())
            .field("key_encoding", &self.key_fallback.encoding())
            .field("value_encoding", &self.value_fallback.encoding())
            .finish()
    }
}

impl Default for DeserializerChain {
    fn default() -> Self {
        Self::standard(true, Encoding::Raw, Encoding::Raw)
    }
}
