/*!
Command handlers for the CLI

This module provides the handlers invoked by the CLI entrypoint:

- `consume` — Read a topic and print its messages
*/

// Consume command handler
pub mod consume {
    //! Topic consumption handler.
    //!
    //! Merges command-line flags with configured defaults, checks the request
    //! before any client exists, then runs the engine against a Kafka client
    //! with stdout as the sink.

    use crate::cli::ConsumeArgs;
    use crate::config::Config;
    use crate::consumer::{self, ConsumptionRequest, KafkaClient, KafkaClientConfig};
    use crate::decode::DeserializerChain;
    use crate::error::{KaftailError, Result};
    use crate::output::{OutputFormat, PrintOptions, WriterSink};
    use std::io::{self, BufWriter, IsTerminal};
    use std::sync::Arc;
    use std::time::Duration;

    /// Output settings resolved from flags and configuration
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OutputSettings {
        /// Record layout
        pub format: OutputFormat,
        /// Fields printed by the text layout
        pub options: PrintOptions,
    }

    /// Builds the consumption request, applying the configured idle timeout
    /// unless overridden on the command line.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid flag combinations. No
    /// network access happens here.
    pub fn build_request(config: &Config, args: &ConsumeArgs) -> Result<ConsumptionRequest> {
        let idle_timeout = match args.idle_timeout {
            Some(0) => {
                return Err(KaftailError::Config(
                    "--idle-timeout must be greater than 0".to_string(),
                )
                .into())
            }
            Some(secs) => Duration::from_secs(secs),
            None => config.consume.idle_timeout(),
        };

        let request = args.to_request(idle_timeout);
        request.validate()?;
        Ok(request)
    }

    /// Builds the deserializer chain from flags and configuration.
    pub fn build_chain(config: &Config, args: &ConsumeArgs) -> DeserializerChain {
        DeserializerChain::standard(
            config.consume.format_json && !args.no_json_format,
            args.key_encoding.unwrap_or(config.consume.key_encoding),
            args.value_encoding.unwrap_or(config.consume.value_encoding),
        )
    }

    /// Resolves output layout and printed fields.
    pub fn output_settings(config: &Config, args: &ConsumeArgs, is_terminal: bool) -> OutputSettings {
        OutputSettings {
            format: args.output.unwrap_or(config.consume.output),
            options: PrintOptions {
                show_key: args.key,
                show_timestamp: args.timestamp,
                show_headers: args.headers,
                show_partition: args.partition_info,
                color: is_terminal && !args.no_color,
            },
        }
    }

    /// Consume a topic and print its messages to stdout
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `args` - Arguments of the consume command
    ///
    /// # Errors
    ///
    /// Returns a configuration error before connecting when the flags
    /// conflict, otherwise the first error of the consumption run.
    pub async fn run_consume(config: Config, args: ConsumeArgs) -> Result<()> {
        let request = build_request(&config, &args)?;
        let chain = build_chain(&config, &args);

        let stdout = io::stdout();
        let settings = output_settings(&config, &args, stdout.is_terminal());
        colored::control::set_override(settings.options.color);

        let client_config = KafkaClientConfig::from_config(&config.kafka)
            .map_err(|e| KaftailError::Config(e.to_string()))?;
        let client = KafkaClient::new(client_config)?;

        tracing::info!(
            topic = %request.topic,
            brokers = %config.kafka.brokers,
            deserializers = ?chain.names(),
            "Starting consumer"
        );

        let mut sink = WriterSink::new(BufWriter::new(stdout), settings.format, settings.options);
        consumer::consume(Arc::new(client), request, chain, &mut sink).await?;
        Ok(())
    }
}
