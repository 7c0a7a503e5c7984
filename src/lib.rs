//! Kaftail - read Kafka topics from the terminal
//!
//! This library provides a multi-partition consumption engine for
//! offset-addressed log topics, together with the command-line surface built
//! on top of it.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `consumer`: Offset resolution, partition supervision, the output
//!   pipeline and shutdown coordination, plus the Kafka and in-memory clients
//! - `decode`: Deserializer chain turning payloads into text
//! - `output`: Records and the sinks they are written to
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging setup
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use kaftail::consumer::{consume, ConsumptionRequest, KafkaClient, KafkaClientConfig};
//! use kaftail::decode::DeserializerChain;
//! use kaftail::output::{OutputFormat, PrintOptions, WriterSink};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = KafkaClient::new(KafkaClientConfig::new("localhost:9092", "kaftail"))?;
//!     let request = ConsumptionRequest::new("events")
//!         .with_from_beginning(true)
//!         .with_exit(true);
//!
//!     let mut sink = WriterSink::new(std::io::stdout(), OutputFormat::Text, PrintOptions::default());
//!     consume(Arc::new(client), request, DeserializerChain::default(), &mut sink).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod consumer;
pub mod decode;
pub mod error;
pub mod logging;
pub mod output;

// Re-export commonly used types
pub use config::Config;
pub use consumer::{consume, ConsumeError, Consumption, ConsumptionRequest};
pub use error::{KaftailError, Result};

#[cfg(test)]
pub mod test_utils;
