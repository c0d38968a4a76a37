// Checkpoint persistence
//
// The watermark is the only state that survives across runs. It is read
// once at run start and written once after the batch is handed to the sink.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use mqtt2table_core::Watermark;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("encode checkpoint: {0}")]
    Encode(serde_json::Error),
}

/// Durable home of the watermark.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self) -> Result<Watermark, CheckpointError>;
    async fn store(&self, watermark: Watermark) -> Result<(), CheckpointError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointDoc {
    watermark: Watermark,
    updated_at: DateTime<Utc>,
}

/// JSON file store.
///
/// The document is written to a sibling temp file and renamed over the
/// target, so an interrupted write never truncates the previous checkpoint.
/// A missing file loads as the default (empty) watermark.
pub struct FsCheckpointStore {
    path: PathBuf,
}

impl FsCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn path_str(&self) -> String {
        self.path.display().to_string()
    }
}

#[async_trait]
impl CheckpointStore for FsCheckpointStore {
    async fn load(&self) -> Result<Watermark, CheckpointError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Watermark::default())
            }
            Err(e) => {
                return Err(CheckpointError::Read {
                    path: self.path_str(),
                    source: e,
                })
            }
        };

        let doc: CheckpointDoc =
            serde_json::from_slice(&bytes).map_err(|e| CheckpointError::Parse {
                path: self.path_str(),
                source: e,
            })?;
        Ok(doc.watermark)
    }

    async fn store(&self, watermark: Watermark) -> Result<(), CheckpointError> {
        let doc = CheckpointDoc {
            watermark,
            updated_at: Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&doc).map_err(CheckpointError::Encode)?;

        let write_err = |e: std::io::Error| CheckpointError::Write {
            path: self.path_str(),
            source: e,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(write_err)?;
        Ok(())
    }
}

/// In-memory store for tests. Clones share the same underlying watermark,
/// so a test can keep a handle to inspect what a connector persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    watermark: Arc<Mutex<Watermark>>,
}

impl MemoryCheckpointStore {
    pub fn with(watermark: Watermark) -> Self {
        Self {
            watermark: Arc::new(Mutex::new(watermark)),
        }
    }

    pub fn current(&self) -> Watermark {
        *self.watermark.lock()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Result<Watermark, CheckpointError> {
        Ok(*self.watermark.lock())
    }

    async fn store(&self, watermark: Watermark) -> Result<(), CheckpointError> {
        *self.watermark.lock() = watermark;
        Ok(())
    }
}
