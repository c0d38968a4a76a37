//! Core building blocks for bounded batch collection: payload decoding,
//! the high-watermark, and the dual-bound window accumulator.

pub mod record;
pub mod watermark;
pub mod window;

pub use record::{decode_payload, DropCounts, DropReason, SyncRecord};
pub use watermark::Watermark;
pub use window::{collect_window, BatchState, WindowLimits};
