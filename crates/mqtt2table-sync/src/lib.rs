//! Broker session, sink and checkpoint seams, and the bounded batch run.

pub mod broker;
pub mod checkpoint;
pub mod run;
pub mod sink;

pub use broker::{BrokerError, BrokerSession};
pub use checkpoint::{CheckpointError, CheckpointStore, FsCheckpointStore, MemoryCheckpointStore};
pub use run::{flush_to_sink, run_batch, Connector, RunOutcome, SyncError, SyncReport};
pub use sink::{JsonlSink, MemorySink, Sink, SinkError, StdoutSink};
