use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use mqtt2table_config::ConnectorConfig;

/// Bounded-batch MQTT to table sync connector
#[derive(Parser)]
#[command(name = "mqtt2table")]
#[command(version)]
#[command(about = "Bounded-batch MQTT to table sync connector", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Collect one bounded batch from the broker and flush it to the sink
    Sync,

    /// Run sync repeatedly with a fixed pause between runs
    Watch {
        /// Seconds to wait between runs
        #[arg(long, value_name = "SECS", default_value_t = 5)]
        interval_secs: u64,
    },

    /// Publish demo messages on the configured topic
    Publish {
        /// Seconds between messages
        #[arg(long, value_name = "SECS", default_value_t = 2.0)]
        period_secs: f64,

        /// Stop after this many messages
        #[arg(long, value_name = "N")]
        count: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let mut config = if let Some(path) = &cli.config {
        ConnectorConfig::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?
    } else {
        ConnectorConfig::load().context("Failed to load configuration")?
    };

    // CLI overrides (highest priority)
    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }

    mqtt2table::init_tracing(&config);

    match cli.command {
        Command::Sync => mqtt2table::run_sync(config).await,
        Command::Watch { interval_secs } => {
            mqtt2table::run_watch(config, Duration::from_secs(interval_secs)).await
        }
        Command::Publish { period_secs, count } => {
            let options = mqtt2table::publish::PublishOptions {
                period: Duration::from_secs_f64(period_secs),
                count,
            };
            mqtt2table::publish::run(&config, options).await
        }
    }
}
