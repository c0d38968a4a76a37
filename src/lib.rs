// mqtt2table - bounded-batch MQTT to table sync connector
//
// Subscribes to a topic, collects well-formed JSON messages for a bounded
// window, deduplicates against a persisted high-watermark, upserts each
// accepted record into a destination table, and checkpoints the watermark.

use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tracing::info;

use mqtt2table_config::ConnectorConfig;
use mqtt2table_sync::Connector;

mod init;
pub mod publish;

pub use init::init_tracing;

/// Graceful shutdown handler
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        },
    }
}

/// Run a single bounded sync against the configured broker and sink.
pub async fn run_sync(config: ConnectorConfig) -> Result<()> {
    let mut connector = Connector::from_config(config);
    connector.sync_once().await?;
    Ok(())
}

/// Run sync repeatedly with a fixed pause between runs, until Ctrl+C/SIGTERM.
///
/// Runs are strictly sequential; the checkpoint is never shared between two
/// in-flight runs. A run that failed to connect leaves the checkpoint for
/// the next iteration.
pub async fn run_watch(config: ConnectorConfig, interval: Duration) -> Result<()> {
    let mut connector = Connector::from_config(config);
    info!(interval_secs = interval.as_secs(), "watch mode, Ctrl+C to stop");

    loop {
        connector.sync_once().await?;

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown_signal() => break,
        }
    }

    info!("watch stopped");
    Ok(())
}
