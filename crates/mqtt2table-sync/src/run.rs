// The bounded batch ingestion run.
//
// One run: connect, subscribe, collect under the dual window bound, tear
// down, flush record-by-record, advance the watermark.

use thiserror::Error;
use tracing::{debug, info, warn};

use mqtt2table_config::{ConnectorConfig, SinkBackend};
use mqtt2table_core::{collect_window, DropCounts, SyncRecord, Watermark, WindowLimits};

use crate::broker::{BrokerError, BrokerSession};
use crate::checkpoint::{CheckpointError, CheckpointStore, FsCheckpointStore};
use crate::sink::{JsonlSink, Sink, StdoutSink};

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The window closed and the batch (possibly empty) was flushed.
    Completed,
    /// The broker could not be reached; nothing was collected or written.
    ConnectFailed(BrokerError),
}

/// Everything one run produced: the accepted records (already handed to the
/// sink), the watermark to carry forward, and drop/write accounting.
#[derive(Debug)]
pub struct SyncReport {
    pub records: Vec<SyncRecord>,
    pub watermark: Watermark,
    pub drops: DropCounts,
    pub written: usize,
    pub write_failures: usize,
    pub outcome: RunOutcome,
}

impl SyncReport {
    fn connect_failed(prior: Watermark, error: BrokerError) -> Self {
        Self {
            records: Vec::new(),
            watermark: prior,
            drops: DropCounts::default(),
            written: 0,
            write_failures: 0,
            outcome: RunOutcome::ConnectFailed(error),
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("checkpoint store: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// One bounded ingestion run.
///
/// Never returns an error: an unreachable broker yields a `ConnectFailed`
/// report with the prior watermark untouched, and a sink failure for one
/// record is counted while the remaining records are still attempted.
pub async fn run_batch(
    config: &ConnectorConfig,
    prior: Watermark,
    sink: &mut dyn Sink,
) -> SyncReport {
    let mut session = match BrokerSession::connect(&config.broker, &config.subscription).await {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "sync run skipped: broker unreachable");
            return SyncReport::connect_failed(prior, e);
        }
    };

    let limits = WindowLimits {
        max_wait: config.window.max_wait(),
        max_records: config.window.max_records,
    };
    let batch = collect_window(
        session.messages(),
        &limits,
        prior,
        &config.subscription.timestamp_field,
    )
    .await;
    session.shutdown().await;

    let (records, drops) = batch.into_parts();
    if drops.has_drops() {
        debug!(
            malformed = drops.malformed,
            non_object = drops.non_object,
            stale = drops.stale,
            "dropped inbound payloads"
        );
    }

    let table = &config.sink.destination_table;
    let (watermark, written, write_failures) = flush_to_sink(sink, table, &records, prior).await;

    info!(
        collected = records.len(),
        written,
        write_failures,
        watermark = %watermark,
        "sync run complete"
    );

    SyncReport {
        records,
        watermark,
        drops,
        written,
        write_failures,
        outcome: RunOutcome::Completed,
    }
}

/// Hand each record to the sink in arrival order.
///
/// A failed write is counted and skipped over; earlier writes are not rolled
/// back and later records are still attempted. The watermark advances only
/// across records that were written successfully, so a failed record stays
/// eligible for the next run. Returns `(watermark, written, failures)` with
/// `watermark >= prior` always.
pub async fn flush_to_sink(
    sink: &mut dyn Sink,
    table: &str,
    records: &[SyncRecord],
    prior: Watermark,
) -> (Watermark, usize, usize) {
    let mut watermark = prior;
    let mut written = 0;
    let mut failures = 0;

    for record in records {
        match sink.upsert(table, &record.payload).await {
            Ok(()) => {
                written += 1;
                if let Some(ts) = record.timestamp {
                    watermark = watermark.advanced(ts);
                }
            }
            Err(e) => {
                warn!(table, error = %e, "sink write failed, continuing with remaining records");
                failures += 1;
            }
        }
    }

    (watermark, written, failures)
}

/// Owns the sink and checkpoint store and serializes runs against them.
///
/// The checkpoint belongs exclusively to the run that reads and later writes
/// it; callers must not overlap runs against the same store.
pub struct Connector {
    config: ConnectorConfig,
    sink: Box<dyn Sink>,
    store: Box<dyn CheckpointStore>,
}

impl Connector {
    pub fn new(
        config: ConnectorConfig,
        sink: Box<dyn Sink>,
        store: Box<dyn CheckpointStore>,
    ) -> Self {
        Self {
            config,
            sink,
            store,
        }
    }

    /// Build the sink and checkpoint store the config names.
    pub fn from_config(config: ConnectorConfig) -> Self {
        let sink: Box<dyn Sink> = match config.sink.backend {
            SinkBackend::Jsonl => Box::new(JsonlSink::new(&config.sink.dir)),
            SinkBackend::Stdout => Box::new(StdoutSink),
        };
        let store = Box::new(FsCheckpointStore::new(&config.checkpoint.path));
        Self::new(config, sink, store)
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// One complete sync: load the checkpoint, run a batch, persist the
    /// advanced watermark. A run that never connected leaves the stored
    /// checkpoint untouched.
    pub async fn sync_once(&mut self) -> Result<SyncReport, SyncError> {
        let prior = self.store.load().await?;
        let report = run_batch(&self.config, prior, self.sink.as_mut()).await;
        if matches!(report.outcome, RunOutcome::Completed) {
            self.store.store(report.watermark).await?;
        }
        Ok(report)
    }
}
