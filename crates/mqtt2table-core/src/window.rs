// Bounded collection window
//
// Accumulates decoded messages until the time or count bound fires,
// whichever comes first.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::record::{decode_payload, DropCounts, DropReason, SyncRecord};
use crate::watermark::Watermark;

/// Dual bound on one collection window.
#[derive(Debug, Clone)]
pub struct WindowLimits {
    pub max_wait: Duration,
    pub max_records: usize,
}

/// Accumulator for one run: accepted records in arrival order plus drop
/// accounting. Created fresh per window and discarded after the flush.
///
/// Staleness is judged against the watermark the window was opened with;
/// duplicates arriving within the same window are kept.
#[derive(Debug)]
pub struct BatchState {
    records: Vec<SyncRecord>,
    drops: DropCounts,
    watermark: Watermark,
    timestamp_field: String,
}

impl BatchState {
    pub fn new(prior: Watermark, timestamp_field: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            drops: DropCounts::default(),
            watermark: prior,
            timestamp_field: timestamp_field.into(),
        }
    }

    /// Decode one inbound payload and accept or drop it. Drops are counted,
    /// never fatal: one bad message must not abort the batch.
    pub fn observe(&mut self, raw: &[u8]) {
        match decode_payload(raw, &self.timestamp_field, self.watermark) {
            Ok(record) => self.records.push(record),
            Err(reason) => {
                if let DropReason::Malformed(e) = &reason {
                    warn!(error = %e, "dropping malformed payload");
                }
                self.drops.record(&reason);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn drops(&self) -> DropCounts {
        self.drops
    }

    pub fn into_parts(self) -> (Vec<SyncRecord>, DropCounts) {
        (self.records, self.drops)
    }
}

/// Drain `rx` until the time or count bound fires, whichever comes first.
///
/// The channel closing early (broker drop) also ends the window; whatever
/// was collected up to that point is returned so the run can still flush
/// and checkpoint.
pub async fn collect_window(
    rx: &mut mpsc::Receiver<Bytes>,
    limits: &WindowLimits,
    prior: Watermark,
    timestamp_field: &str,
) -> BatchState {
    let mut batch = BatchState::new(prior, timestamp_field);
    let deadline = Instant::now() + limits.max_wait;

    while batch.len() < limits.max_records {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(raw)) => batch.observe(&raw),
            Ok(None) => {
                debug!("message channel closed before window bounds");
                break;
            }
            Err(_) => break,
        }
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn payload(ts: f64) -> Bytes {
        Bytes::from(format!(r#"{{"msg":"hello world","ts":{}}}"#, ts))
    }

    #[tokio::test]
    async fn count_bound_ends_window_before_timeout() {
        let (tx, mut rx) = mpsc::channel(16);
        for ts in [1.0, 2.0, 3.0, 4.0, 5.0] {
            tx.send(payload(ts)).await.unwrap();
        }

        let limits = WindowLimits {
            max_wait: Duration::from_secs(1),
            max_records: 3,
        };
        let started = std::time::Instant::now();
        let batch = collect_window(&mut rx, &limits, Watermark::default(), "ts").await;

        assert_eq!(batch.len(), 3);
        assert!(started.elapsed() < Duration::from_millis(900));
    }

    #[tokio::test]
    async fn time_bound_ends_window_with_partial_batch() {
        let (tx, mut rx) = mpsc::channel(16);
        tx.send(payload(1.0)).await.unwrap();
        tx.send(payload(2.0)).await.unwrap();

        let limits = WindowLimits {
            max_wait: Duration::from_millis(300),
            max_records: 3,
        };
        let started = std::time::Instant::now();
        let batch = collect_window(&mut rx, &limits, Watermark::default(), "ts").await;
        drop(tx);

        assert_eq!(batch.len(), 2);
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn channel_close_ends_window_early() {
        let (tx, mut rx) = mpsc::channel(16);
        tx.send(payload(1.0)).await.unwrap();
        drop(tx);

        let limits = WindowLimits {
            max_wait: Duration::from_secs(5),
            max_records: 10,
        };
        let started = std::time::Instant::now();
        let batch = collect_window(&mut rx, &limits, Watermark::default(), "ts").await;

        assert_eq!(batch.len(), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn replayed_and_malformed_payloads_are_dropped_not_fatal() {
        let (tx, mut rx) = mpsc::channel(16);
        tx.send(Bytes::from_static(b"{not json")).await.unwrap();
        tx.send(Bytes::from_static(b"[1,2,3]")).await.unwrap();
        tx.send(payload(50.0)).await.unwrap();
        tx.send(payload(150.0)).await.unwrap();
        drop(tx);

        let limits = WindowLimits {
            max_wait: Duration::from_secs(1),
            max_records: 10,
        };
        let batch = collect_window(&mut rx, &limits, Watermark::at(100.0), "ts").await;

        assert_eq!(batch.len(), 1);
        let drops = batch.drops();
        assert_eq!(drops.malformed, 1);
        assert_eq!(drops.non_object, 1);
        assert_eq!(drops.stale, 1);

        let (records, _) = batch.into_parts();
        assert_eq!(records[0].timestamp, Some(150.0));
    }

    #[tokio::test]
    async fn arrival_order_is_preserved_and_in_window_duplicates_kept() {
        let (tx, mut rx) = mpsc::channel(16);
        for ts in [150.0, 120.0, 120.0, 200.0] {
            tx.send(payload(ts)).await.unwrap();
        }
        drop(tx);

        let limits = WindowLimits {
            max_wait: Duration::from_secs(1),
            max_records: 10,
        };
        let batch = collect_window(&mut rx, &limits, Watermark::at(100.0), "ts").await;
        let (records, _) = batch.into_parts();

        let timestamps: Vec<_> = records.iter().map(|r| r.timestamp.unwrap()).collect();
        assert_eq!(timestamps, vec![150.0, 120.0, 120.0, 200.0]);
    }
}
