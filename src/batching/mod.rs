//! Batching for bulk document writes.

mod hybrid_batcher;

pub use hybrid_batcher::{BatchConfig, FlushBatch, FlushReason, HybridBatcher, SizedItem};
