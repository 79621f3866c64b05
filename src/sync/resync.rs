// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Full re-sync of an app from the primary store.
//!
//! Records are scanned page by page in id order, mapped, and written with
//! bulk requests bounded by the app's batch size and the configured byte
//! budget. Each bulk request gets its own [`BatchResult`].

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::SyncError;
use crate::apps::SearchApp;
use crate::batching::{BatchConfig, FlushBatch, FlushReason, HybridBatcher};
use crate::config::SearchConfig;
use crate::document::Document;
use crate::metrics;
use crate::registry::AppRegistry;
use crate::resilience::{retry_if, RetryConfig};
use crate::search::Backfill;
use crate::source::EntitySource;
use crate::storage::{DocumentStore, StorageError};

/// Outcome of one bulk request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    pub count: usize,
    pub bytes: usize,
    pub written: usize,
    /// (document id, reason)
    pub failed: Vec<(String, String)>,
    #[serde(skip)]
    pub reason: FlushReason,
}

/// Outcome of a full re-sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResyncReport {
    pub app: String,
    pub index: String,
    pub batches: Vec<BatchResult>,
    /// Records that could not be mapped: (record id, reason)
    pub unmapped: Vec<(String, String)>,
}

impl ResyncReport {
    pub fn written(&self) -> usize {
        self.batches.iter().map(|b| b.written).sum()
    }

    pub fn failed(&self) -> usize {
        self.batches.iter().map(|b| b.failed.len()).sum::<usize>() + self.unmapped.len()
    }

    pub fn total(&self) -> usize {
        self.batches.iter().map(|b| b.count).sum::<usize>() + self.unmapped.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Rebuilds app indices from the primary store.
pub struct Resyncer {
    source: Arc<dyn EntitySource>,
    store: Arc<dyn DocumentStore>,
    registry: Arc<AppRegistry>,
    config: Arc<SearchConfig>,
    retry: RetryConfig,
}

impl Resyncer {
    pub fn new(
        source: Arc<dyn EntitySource>,
        store: Arc<dyn DocumentStore>,
        registry: Arc<AppRegistry>,
        config: Arc<SearchConfig>,
    ) -> Self {
        Self {
            source,
            store,
            registry,
            config,
            retry: RetryConfig::sync(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Re-sync every record of `app` through its write alias.
    pub async fn resync(&self, app: &str) -> Result<ResyncReport, SyncError> {
        let target = self.config.write_alias(app);
        self.resync_into(app, &target).await
    }

    /// Re-sync every registered app, in registration order.
    pub async fn resync_all(&self) -> Result<Vec<ResyncReport>, SyncError> {
        let mut reports = Vec::with_capacity(self.registry.len());
        for name in self.registry.names() {
            reports.push(self.resync(name).await?);
        }
        Ok(reports)
    }

    /// Write every record of `app` into `target` (index or alias).
    ///
    /// Source and lookup failures abort. A bulk request that still fails
    /// after retries is reported as a failed batch and the scan goes on.
    #[instrument(skip(self))]
    pub async fn resync_into(&self, app: &str, target: &str) -> Result<ResyncReport, SyncError> {
        let search_app = self.registry.get(app)?;
        let page_size = search_app.bulk_batch_size().min(self.config.bulk_batch_size).max(1);
        let mut batcher: HybridBatcher<Document> =
            HybridBatcher::new(BatchConfig::for_app(&self.config, page_size));
        let mut report = ResyncReport {
            app: app.to_string(),
            index: target.to_string(),
            ..Default::default()
        };

        let expected = self.source.count(search_app.kind()).await?;
        info!(expected, page_size, "Resync started");

        let mut offset = 0;
        loop {
            let page = self.source.scan(search_app.kind(), offset, page_size).await?;
            let fetched = page.len();
            for record in &page {
                match search_app.produce_document(record) {
                    Ok(doc) => {
                        if let Some(batch) = batcher.add(doc) {
                            report.batches.push(self.write_batch(search_app.as_ref(), target, batch).await);
                        }
                    }
                    Err(e) => {
                        warn!(id = %record.id(), error = %e, "Record could not be mapped");
                        report.unmapped.push((record.id().to_string(), e.to_string()));
                    }
                }
            }
            offset += fetched;
            if fetched < page_size {
                break;
            }
        }
        if let Some(batch) = batcher.finish() {
            report.batches.push(self.write_batch(search_app.as_ref(), target, batch).await);
        }
        if let Err(e) = self.store.refresh(target).await {
            warn!(error = %e, "Refresh after resync failed");
        }

        info!(
            written = report.written(),
            failed = report.failed(),
            batches = report.batches.len(),
            "Resync complete"
        );
        Ok(report)
    }

    async fn write_batch(
        &self,
        app: &dyn SearchApp,
        target: &str,
        batch: FlushBatch<Document>,
    ) -> BatchResult {
        let count = batch.items.len();
        let result = retry_if(
            "bulk_index",
            &self.retry,
            || self.store.bulk_index(target, &batch.items),
            StorageError::is_transient,
        )
        .await;
        metrics::record_bulk_batch(app.name(), count, batch.total_bytes, matches!(&result, Ok(r) if r.is_success()));
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                warn!(app = app.name(), count, error = %e, "Bulk batch rejected");
                let reason = e.to_string();
                return BatchResult {
                    count,
                    bytes: batch.total_bytes,
                    written: 0,
                    failed: batch.items.iter().map(|doc| (doc.id.to_string(), reason.clone())).collect(),
                    reason: batch.reason,
                };
            }
        };

        if !result.is_success() {
            warn!(app = app.name(), failed = result.failed.len(), count, "Bulk batch partially failed");
        } else {
            debug!(app = app.name(), count, bytes = batch.total_bytes, reason = ?batch.reason, "Bulk batch written");
        }
        BatchResult {
            count,
            bytes: batch.total_bytes,
            written: result.written,
            failed: result.failed,
            reason: batch.reason,
        }
    }
}

#[async_trait]
impl Backfill for Resyncer {
    async fn backfill(&self, app: &str, index: &str) -> Result<u64, SyncError> {
        let report = self.resync_into(app, index).await?;
        if !report.is_success() {
            return Err(SyncError::Incomplete {
                failed: report.failed(),
                total: report.total(),
            });
        }
        Ok(report.written() as u64)
    }
}
