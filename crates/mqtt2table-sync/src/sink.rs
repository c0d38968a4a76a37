// Record sinks
//
// The sink contract is one upsert per record, keyed by a destination table
// name; idempotence is whatever identity the backend infers from the record.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{0}")]
    Rejected(String),
}

/// Destination for accepted records.
#[async_trait]
pub trait Sink: Send {
    async fn upsert(&mut self, table: &str, record: &Value) -> Result<(), SinkError>;
}

/// Appends each record as one JSON line to `<dir>/<table>.jsonl`.
///
/// The local stand-in for a warehouse connector: append-only, so replayed
/// records that slip past the watermark show up as duplicate lines rather
/// than overwrites.
pub struct JsonlSink {
    dir: PathBuf,
}

impl JsonlSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Sink for JsonlSink {
    async fn upsert(&mut self, table: &str, record: &Value) -> Result<(), SinkError> {
        let line = serde_json::to_string(record)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{}.jsonl", table));
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        Ok(())
    }
}

/// Writes each record as a tab-separated `<table>\t<json>` line to stdout.
pub struct StdoutSink;

#[async_trait]
impl Sink for StdoutSink {
    async fn upsert(&mut self, table: &str, record: &Value) -> Result<(), SinkError> {
        let line = serde_json::to_string(record)?;
        println!("{}\t{}", table, line);
        Ok(())
    }
}

/// In-memory sink for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub rows: Vec<(String, Value)>,
}

#[async_trait]
impl Sink for MemorySink {
    async fn upsert(&mut self, table: &str, record: &Value) -> Result<(), SinkError> {
        self.rows.push((table.to_string(), record.clone()));
        Ok(())
    }
}
