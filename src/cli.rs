//! Command-line interface definition for Kaftail
//!
//! This module defines the CLI structure using clap's derive API.

use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::consumer::{ConsumptionRequest, PartitionOffset};
use crate::decode::Encoding;
use crate::output::OutputFormat;

/// Kaftail - read Kafka topics from the terminal
///
/// Follows, replays or tails one or more partitions of a topic and prints
/// the messages to stdout.
#[derive(Parser, Debug, Clone)]
#[command(name = "kaftail")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "kaftail.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Comma-separated bootstrap brokers, overriding the configuration
    #[arg(long, global = true)]
    pub brokers: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Kaftail
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Consume messages from a topic
    Consume(ConsumeArgs),
}

/// Arguments of the `consume` command
#[derive(Args, Debug, Clone, Default)]
pub struct ConsumeArgs {
    /// Topic to consume
    pub topic: String,

    /// Partitions to read (default: all)
    #[arg(short, long, value_delimiter = ',')]
    pub partitions: Vec<i32>,

    /// Start offset per partition, as PARTITION=OFFSET (OFFSET may be
    /// `oldest` or `newest`)
    #[arg(long = "offset", value_name = "PARTITION=OFFSET", value_delimiter = ',')]
    pub offsets: Vec<PartitionOffset>,

    /// Start partitions without an explicit offset at the oldest message
    #[arg(short = 'b', long)]
    pub from_beginning: bool,

    /// Print only the N most recent messages, oldest first
    #[arg(short = 'n', long, value_name = "N")]
    pub tail: Option<usize>,

    /// Stop once every partition reaches its newest offset
    #[arg(short, long)]
    pub exit: bool,

    /// Print the message key
    #[arg(short, long)]
    pub key: bool,

    /// Print the message timestamp
    #[arg(long)]
    pub timestamp: bool,

    /// Print the message headers
    #[arg(long)]
    pub headers: bool,

    /// Print partition and offset of each message
    #[arg(long)]
    pub partition_info: bool,

    /// Encoding for keys that no deserializer claims
    #[arg(long, value_enum)]
    pub key_encoding: Option<Encoding>,

    /// Encoding for values that no deserializer claims
    #[arg(long, value_enum)]
    pub value_encoding: Option<Encoding>,

    /// Output layout
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Seconds without messages after which a bounded run treats a
    /// partition as caught up
    #[arg(long, value_name = "SECS")]
    pub idle_timeout: Option<u64>,

    /// Print JSON values as received instead of pretty-printing them
    #[arg(long)]
    pub no_json_format: bool,

    /// Disable colored labels
    #[arg(long)]
    pub no_color: bool,
}

impl ConsumeArgs {
    /// Builds the consumption request described by these arguments.
    pub fn to_request(&self, idle_timeout: Duration) -> ConsumptionRequest {
        let mut request = ConsumptionRequest::new(&self.topic)
            .with_partitions(self.partitions.clone())
            .with_offsets(self.offsets.clone())
            .with_from_beginning(self.from_beginning)
            .with_exit(self.exit)
            .with_idle_timeout(idle_timeout);
        if let Some(tail) = self.tail {
            request = request.with_tail(tail);
        }
        request
    }
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::OffsetSpec;

    fn consume(args: &[&str]) -> ConsumeArgs {
        let mut argv = vec!["kaftail", "consume"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Consume(args) => args,
        }
    }

    #[test]
    fn test_cli_parse_consume_defaults() {
        let args = consume(&["events"]);
        assert_eq!(args.topic, "events");
        assert!(args.partitions.is_empty());
        assert!(args.offsets.is_empty());
        assert!(!args.from_beginning);
        assert_eq!(args.tail, None);
        assert!(!args.exit);
        assert_eq!(args.output, None);
    }

    #[test]
    fn test_cli_parse_partitions_and_offsets() {
        let args = consume(&["events", "-p", "0,2", "--offset", "0=5", "--offset", "2=oldest"]);
        assert_eq!(args.partitions, vec![0, 2]);
        assert_eq!(args.offsets.len(), 2);
        assert_eq!(args.offsets[0].offset, OffsetSpec::At(5));
        assert_eq!(args.offsets[1].offset, OffsetSpec::Oldest);
    }

    #[test]
    fn test_cli_parse_tail_and_flags() {
        let args = consume(&["events", "-n", "10", "-k", "--timestamp", "-o", "json"]);
        assert_eq!(args.tail, Some(10));
        assert!(args.key);
        assert!(args.timestamp);
        assert_eq!(args.output, Some(OutputFormat::Json));
    }

    #[test]
    fn test_cli_parse_encodings() {
        let args = consume(&["events", "--key-encoding", "hex", "--value-encoding", "base64"]);
        assert_eq!(args.key_encoding, Some(Encoding::Hex));
        assert_eq!(args.value_encoding, Some(Encoding::Base64));
    }

    #[test]
    fn test_cli_parse_invalid_offset() {
        let cli = Cli::try_parse_from(["kaftail", "consume", "events", "--offset", "five"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_cli_parse_global_flags() {
        let cli = Cli::try_parse_from(["kaftail", "-v", "consume", "events", "--brokers", "b:9092"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.brokers.as_deref(), Some("b:9092"));
        assert_eq!(cli.config.as_deref(), Some("kaftail.yaml"));
    }

    #[test]
    fn test_cli_parse_missing_topic() {
        assert!(Cli::try_parse_from(["kaftail", "consume"]).is_err());
    }

    #[test]
    fn test_to_request() {
        let args = consume(&["events", "-b", "-e", "-p", "1"]);
        let request = args.to_request(Duration::from_secs(2));
        assert_eq!(request.topic, "events");
        assert_eq!(request.partitions, vec![1]);
        assert!(request.from_beginning);
        assert!(request.exit);
        assert_eq!(request.idle_timeout, Duration::from_secs(2));
        assert!(request.validate().is_ok());
    }
}
