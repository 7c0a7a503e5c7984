//! Kaftail - read Kafka topics from the terminal
//!
#![doc = "Kaftail - read Kafka topics from the terminal"]
#![doc = "Main entry point for the kaftail binary."]

use anyhow::Result;

use kaftail::cli::{Cli, Commands};
use kaftail::commands;
use kaftail::config::Config;
use kaftail::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("kaftail.yaml");
    let config = Config::load(config_path, &cli)?;

    // Logging goes to stderr; stdout carries the records
    init_logging(&config.logging)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Consume(args) => {
            tracing::debug!(topic = %args.topic, "Starting consume command");
            commands::consume::run_consume(config, args).await?;
            Ok(())
        }
    }
}
