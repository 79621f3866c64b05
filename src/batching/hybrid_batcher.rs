// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bulk request batching.
//!
//! Documents are collected until either the document count or the encoded
//! byte total reaches its limit, and then handed back as one bulk request.
//! A single document larger than the byte limit still goes out, alone.
//!
//! ```text
//! add(doc) ──► pending ──┬─ len ≥ max_docs   → FlushBatch { reason: Count }
//!                        ├─ bytes ≥ max_bytes → FlushBatch { reason: Size }
//!                        └─ finish()          → FlushBatch { reason: Final }
//! ```
//!
//! # Example
//!
//! ```
//! use datahub_search::batching::{BatchConfig, FlushReason, HybridBatcher, SizedItem};
//!
//! struct Doc(&'static str);
//! impl SizedItem for Doc {
//!     fn size_bytes(&self) -> usize { self.0.len() }
//! }
//!
//! let mut batcher = HybridBatcher::new(BatchConfig { max_docs: 2, max_bytes: 1024 });
//! assert!(batcher.add(Doc("a")).is_none());
//! let batch = batcher.add(Doc("b")).unwrap();
//! assert_eq!(batch.reason, FlushReason::Count);
//! assert_eq!(batch.items.len(), 2);
//! assert!(batcher.finish().is_none());
//! ```

use tracing::trace;

use crate::config::SearchConfig;

/// Why a batch was handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    Count,
    Size,
    /// End of input
    Final,
}

/// Limits of one bulk request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub max_docs: usize,
    pub max_bytes: usize,
}

impl BatchConfig {
    /// An app's batch size with the configured byte budget. Both limits are
    /// at least 1.
    pub fn for_app(config: &SearchConfig, bulk_batch_size: usize) -> Self {
        Self {
            max_docs: bulk_batch_size.max(1),
            max_bytes: config.bulk_batch_bytes.max(1),
        }
    }
}

/// Documents of one bulk request.
#[derive(Debug)]
pub struct FlushBatch<T> {
    pub items: Vec<T>,
    pub total_bytes: usize,
    pub reason: FlushReason,
}

/// Items that know their encoded size.
pub trait SizedItem {
    fn size_bytes(&self) -> usize;
}

/// Splits a stream of documents into bulk requests bounded by count and
/// bytes, whichever limit is reached first.
#[derive(Debug)]
pub struct HybridBatcher<T> {
    config: BatchConfig,
    pending: Vec<T>,
    pending_bytes: usize,
}

impl<T: SizedItem> HybridBatcher<T> {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            pending: Vec::with_capacity(config.max_docs.min(1024)),
            pending_bytes: 0,
        }
    }

    /// Queue `item`; returns the batch it completed, if any.
    pub fn add(&mut self, item: T) -> Option<FlushBatch<T>> {
        self.pending_bytes += item.size_bytes();
        self.pending.push(item);

        let reason = if self.pending.len() >= self.config.max_docs {
            FlushReason::Count
        } else if self.pending_bytes >= self.config.max_bytes {
            FlushReason::Size
        } else {
            return None;
        };
        Some(self.drain(reason))
    }

    /// Hand out the remainder at end of input.
    pub fn finish(&mut self) -> Option<FlushBatch<T>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.drain(FlushReason::Final))
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending_bytes(&self) -> usize {
        self.pending_bytes
    }

    fn drain(&mut self, reason: FlushReason) -> FlushBatch<T> {
        let items = std::mem::take(&mut self.pending);
        let total_bytes = std::mem::replace(&mut self.pending_bytes, 0);
        trace!(count = items.len(), bytes = total_bytes, ?reason, "Bulk batch ready");
        FlushBatch { items, total_bytes, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doc(usize);

    impl SizedItem for Doc {
        fn size_bytes(&self) -> usize {
            self.0
        }
    }

    fn batcher(max_docs: usize, max_bytes: usize) -> HybridBatcher<Doc> {
        HybridBatcher::new(BatchConfig { max_docs, max_bytes })
    }

    #[test]
    fn test_count_limit() {
        let mut b = batcher(3, 1_000_000);
        assert!(b.add(Doc(100)).is_none());
        assert!(b.add(Doc(100)).is_none());
        let batch = b.add(Doc(100)).unwrap();
        assert_eq!(batch.reason, FlushReason::Count);
        assert_eq!(batch.total_bytes, 300);
        assert!(b.is_empty());
        assert_eq!(b.pending_bytes(), 0);
    }

    #[test]
    fn test_byte_limit() {
        let mut b = batcher(1000, 500);
        assert!(b.add(Doc(200)).is_none());
        assert!(b.add(Doc(200)).is_none());
        let batch = b.add(Doc(200)).unwrap();
        assert_eq!(batch.reason, FlushReason::Size);
        assert_eq!(batch.items.len(), 3);
    }

    #[test]
    fn test_oversized_document_goes_alone() {
        let mut b = batcher(1000, 500);
        let batch = b.add(Doc(5000)).unwrap();
        assert_eq!(batch.items.len(), 1);
        assert_eq!(batch.reason, FlushReason::Size);
    }

    #[test]
    fn test_count_wins_when_both_limits_hit() {
        let mut b = batcher(2, 200);
        b.add(Doc(100));
        assert_eq!(b.add(Doc(100)).unwrap().reason, FlushReason::Count);
    }

    #[test]
    fn test_finish_hands_out_remainder_once() {
        let mut b = batcher(10, 1_000_000);
        b.add(Doc(1));
        b.add(Doc(2));
        assert_eq!(b.len(), 2);

        let batch = b.finish().unwrap();
        assert_eq!(batch.reason, FlushReason::Final);
        assert_eq!(batch.total_bytes, 3);
        assert!(b.finish().is_none());
    }

    #[test]
    fn test_for_app_limits_are_positive() {
        let config = SearchConfig::default();
        let limits = BatchConfig::for_app(&config, 0);
        assert_eq!(limits.max_docs, 1);
        assert_eq!(limits.max_bytes, config.bulk_batch_bytes);
    }
}
