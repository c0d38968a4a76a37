// Contract tests for the bounded batch run.
//
// These run without a live broker: the connection-failure paths use a local
// port with nothing listening, and the collection/flush paths drive the
// channel seam directly.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;

use mqtt2table_config::ConnectorConfig;
use mqtt2table_core::{collect_window, Watermark, WindowLimits};
use mqtt2table_sync::{
    flush_to_sink, run_batch, Connector, MemoryCheckpointStore, MemorySink, RunOutcome,
};

/// Config pointing at a local port that is guaranteed to refuse connections.
fn unreachable_config() -> ConnectorConfig {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut config = ConnectorConfig::default();
    config.broker.host = "127.0.0.1".to_string();
    config.broker.port = port;
    config.broker.connect_timeout_secs = 2;
    config.window.max_wait_secs = 1;
    config
}

#[tokio::test]
async fn connect_failure_is_a_no_op_run() {
    let config = unreachable_config();
    let prior = Watermark::at(100.0);
    let mut sink = MemorySink::default();

    let report = run_batch(&config, prior, &mut sink).await;

    assert!(matches!(report.outcome, RunOutcome::ConnectFailed(_)));
    assert!(report.records.is_empty());
    assert_eq!(report.watermark, prior);
    assert_eq!(report.written, 0);
    assert!(sink.rows.is_empty());
}

#[tokio::test]
async fn connect_failure_leaves_the_stored_checkpoint_untouched() {
    let config = unreachable_config();
    let store = MemoryCheckpointStore::with(Watermark::at(100.0));
    let observer = store.clone();

    let mut connector = Connector::new(
        config,
        Box::new(MemorySink::default()),
        Box::new(store),
    );
    let report = connector.sync_once().await.unwrap();

    assert!(matches!(report.outcome, RunOutcome::ConnectFailed(_)));
    assert_eq!(observer.current(), Watermark::at(100.0));
}

#[tokio::test]
async fn invalid_qos_fails_the_run_without_touching_the_checkpoint() {
    let mut config = unreachable_config();
    config.subscription.qos = 7;
    let prior = Watermark::at(3.0);
    let mut sink = MemorySink::default();

    let report = run_batch(&config, prior, &mut sink).await;

    assert!(matches!(report.outcome, RunOutcome::ConnectFailed(_)));
    assert_eq!(report.watermark, prior);
}

#[tokio::test]
async fn replay_protection_and_checkpoint_advance_end_to_end() {
    // Prior checkpoint 100, incoming timestamps [50, 150, 120, 200]:
    // the accepted batch is [150, 120, 200] in arrival order and the new
    // checkpoint is 200.
    let (tx, mut rx) = mpsc::channel::<Bytes>(16);
    for ts in [50.0, 150.0, 120.0, 200.0] {
        let payload = format!(r#"{{"msg":"hello world","ts":{}}}"#, ts);
        tx.send(Bytes::from(payload)).await.unwrap();
    }
    drop(tx);

    let limits = WindowLimits {
        max_wait: Duration::from_secs(1),
        max_records: 10,
    };
    let prior = Watermark::at(100.0);
    let batch = collect_window(&mut rx, &limits, prior, "ts").await;
    let (records, drops) = batch.into_parts();

    let timestamps: Vec<_> = records.iter().map(|r| r.timestamp.unwrap()).collect();
    assert_eq!(timestamps, vec![150.0, 120.0, 200.0]);
    assert_eq!(drops.stale, 1);

    let mut sink = MemorySink::default();
    let (watermark, written, failures) =
        flush_to_sink(&mut sink, "hello_messages", &records, prior).await;

    assert_eq!(watermark, Watermark::at(200.0));
    assert_eq!(written, 3);
    assert_eq!(failures, 0);
    assert_eq!(sink.rows.len(), 3);
    assert_eq!(
        sink.rows[0].1.get("ts").and_then(serde_json::Value::as_f64),
        Some(150.0)
    );
}
