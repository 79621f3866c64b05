// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Mutation-driven document sync.

use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::{MutationEvent, SyncError, SyncReport};
use crate::apps::SearchApp;
use crate::config::SearchConfig;
use crate::entity::{EntityKind, EntityRef};
use crate::metrics;
use crate::registry::AppRegistry;
use crate::resilience::{retry_if, RetryConfig};
use crate::source::EntitySource;
use crate::storage::{DocumentStore, StorageError};

/// Outcome of syncing a single document.
enum Synced {
    Indexed,
    Deleted,
}

/// Applies mutation events to the document store.
pub struct SyncEngine {
    source: Arc<dyn EntitySource>,
    store: Arc<dyn DocumentStore>,
    registry: Arc<AppRegistry>,
    config: Arc<SearchConfig>,
    retry: RetryConfig,
    disconnected: Mutex<HashSet<EntityKind>>,
    suspended: Mutex<HashMap<EntityKind, usize>>,
    failed: Mutex<BTreeSet<EntityRef>>,
    failures_total: AtomicU64,
}

impl SyncEngine {
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
            disconnected: Mutex::new(HashSet::new()),
            suspended: Mutex::new(HashMap::new()),
            failed: Mutex::new(BTreeSet::new()),
            failures_total: AtomicU64::new(0),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Start a worker that applies events in arrival order.
    ///
    /// The worker stops once every [`MutationSender`] is dropped and the
    /// queue is drained.
    pub fn spawn(self: Arc<Self>) -> (MutationSender, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<MutationEvent>(self.config.sync_channel_capacity.max(1));
        let engine = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            info!("Sync worker running");
            while let Some(event) = rx.recv().await {
                engine.handle(event).await;
            }
            info!("Sync worker stopped");
        });
        (MutationSender { tx, engine: self }, handle)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Connection control
    // ═══════════════════════════════════════════════════════════════════════

    /// Resume syncing `kind`.
    pub fn connect(&self, kind: EntityKind) {
        if self.disconnected.lock().remove(&kind) {
            info!(kind = %kind, "Sync connected");
        }
    }

    /// Stop syncing `kind` until [`connect`](Self::connect) is called.
    pub fn disconnect(&self, kind: EntityKind) {
        if self.disconnected.lock().insert(kind) {
            info!(kind = %kind, "Sync disconnected");
        }
    }

    /// Stop syncing `kind` while the returned guard lives.
    ///
    /// Guards nest; syncing resumes when the last one is dropped.
    pub fn suspend(&self, kind: EntityKind) -> SuspendGuard<'_> {
        *self.suspended.lock().entry(kind).or_insert(0) += 1;
        debug!(kind = %kind, "Sync suspended");
        SuspendGuard { engine: self, kind }
    }

    pub fn is_connected(&self, kind: EntityKind) -> bool {
        !self.disconnected.lock().contains(&kind)
            && self.suspended.lock().get(&kind).copied().unwrap_or(0) == 0
    }

    fn resume(&self, kind: EntityKind) {
        let mut suspended = self.suspended.lock();
        if let Some(count) = suspended.get_mut(&kind) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                suspended.remove(&kind);
                debug!(kind = %kind, "Sync resumed");
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Event handling
    // ═══════════════════════════════════════════════════════════════════════

    /// Apply one event. Never fails; problems are reported and parked for
    /// [`retry_failed`](Self::retry_failed).
    pub async fn handle(&self, event: MutationEvent) -> SyncReport {
        let entity = event.entity();
        let mut report = SyncReport::default();

        if let Some(app) = self.registry.get_by_kind(entity.kind) {
            self.sync_into_report(app, entity, &mut report).await;
        }
        // Dependents of a deleted record keep their embedded snapshot
        if !matches!(event, MutationEvent::Deleted(_)) {
            report.merge(self.cascade(entity).await);
        }
        report
    }

    /// Rebuild the documents that embed a summary of `entity`.
    async fn cascade(&self, entity: EntityRef) -> SyncReport {
        let mut report = SyncReport::default();
        for (app, relation) in self.registry.dependents_of(entity.kind) {
            let dependents = match self.source.referencing(app.kind(), relation, entity.id).await {
                Ok(ids) => ids,
                Err(e) => {
                    // The trigger itself is parked; its retry re-runs the cascade
                    self.record_failure(app.name(), entity, &SyncError::from(e), &mut report);
                    continue;
                }
            };
            metrics::record_cascade_size(app.name(), dependents.len());
            debug!(
                source = %entity,
                app = app.name(),
                relation,
                count = dependents.len(),
                "Refreshing dependent documents"
            );
            for id in dependents {
                self.sync_into_report(app, EntityRef::new(app.kind(), id), &mut report).await;
            }
        }
        report
    }

    async fn sync_into_report(&self, app: &Arc<dyn SearchApp>, entity: EntityRef, report: &mut SyncReport) {
        if !self.is_connected(entity.kind) {
            metrics::record_sync(app.name(), "sync", "skipped");
            report.skipped.push(entity);
            return;
        }
        match self.sync_document(app.as_ref(), entity).await {
            Ok(Synced::Indexed) => {
                metrics::record_sync(app.name(), "upsert", "success");
                report.indexed.push(entity);
            }
            Ok(Synced::Deleted) => {
                metrics::record_sync(app.name(), "delete", "success");
                report.deleted.push(entity);
            }
            Err(e) => self.record_failure(app.name(), entity, &e, report),
        }
    }

    /// Make the document of `entity` match the primary store: upsert when
    /// the record exists, delete otherwise.
    async fn sync_document(&self, app: &dyn SearchApp, entity: EntityRef) -> Result<Synced, SyncError> {
        let _timer = metrics::LatencyTimer::new(app.name(), "sync");
        let alias = self.config.write_alias(app.name());

        match self.source.fetch(entity).await? {
            Some(record) => {
                let doc = app.produce_document(&record)?;
                retry_if(
                    "index_document",
                    &self.retry,
                    || self.store.index_document(&alias, &doc),
                    StorageError::is_transient,
                )
                .await?;
                debug!(entity = %entity, alias = %alias, "Document indexed");
                Ok(Synced::Indexed)
            }
            None => {
                let id = entity.id.to_string();
                let removed = retry_if(
                    "delete_document",
                    &self.retry,
                    || self.store.delete_document(&alias, &id),
                    StorageError::is_transient,
                )
                .await?;
                debug!(entity = %entity, alias = %alias, removed, "Document deleted");
                Ok(Synced::Deleted)
            }
        }
    }

    fn record_failure(&self, app: &str, entity: EntityRef, error: &SyncError, report: &mut SyncReport) {
        warn!(app, entity = %entity, error = %error, "Document sync failed");
        metrics::record_sync_failure(app, error.error_type());
        self.failures_total.fetch_add(1, Ordering::Relaxed);
        let pending = {
            let mut failed = self.failed.lock();
            failed.insert(entity);
            failed.len()
        };
        metrics::set_failed_pending(pending);
        report.failed.push((entity, error.to_string()));
    }

    /// Park an entity for [`retry_failed`](Self::retry_failed) without
    /// attempting a sync.
    pub(crate) fn park(&self, entity: EntityRef, reason: &str) {
        warn!(entity = %entity, reason, "Mutation event dropped, parked for retry");
        self.failures_total.fetch_add(1, Ordering::Relaxed);
        let pending = {
            let mut failed = self.failed.lock();
            failed.insert(entity);
            failed.len()
        };
        metrics::set_failed_pending(pending);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Failure recovery
    // ═══════════════════════════════════════════════════════════════════════

    /// Entities whose last sync failed.
    pub fn failed(&self) -> Vec<EntityRef> {
        self.failed.lock().iter().copied().collect()
    }

    /// Total sync failures since start, including ones later retried.
    pub fn failure_count(&self) -> u64 {
        self.failures_total.load(Ordering::Relaxed)
    }

    /// Re-sync every parked entity from its current primary-store state.
    ///
    /// Saved records are re-indexed along with their dependents; records
    /// that are gone have their document removed. Whatever still fails is
    /// parked again.
    #[instrument(skip(self))]
    pub async fn retry_failed(&self) -> SyncReport {
        let pending: Vec<EntityRef> = std::mem::take(&mut *self.failed.lock()).into_iter().collect();
        metrics::set_failed_pending(0);
        if pending.is_empty() {
            return SyncReport::default();
        }
        info!(count = pending.len(), "Retrying failed document syncs");

        let mut report = SyncReport::default();
        for entity in pending {
            report.merge(self.handle(MutationEvent::Saved(entity)).await);
        }
        info!(
            indexed = report.indexed.len(),
            deleted = report.deleted.len(),
            still_failed = report.failed.len(),
            "Retry of failed syncs complete"
        );
        report
    }
}

/// Re-enables syncing of a kind when dropped.
pub struct SuspendGuard<'a> {
    engine: &'a SyncEngine,
    kind: EntityKind,
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        self.engine.resume(self.kind);
    }
}

/// Handle the CRUD layer uses to report mutations.
#[derive(Clone)]
pub struct MutationSender {
    tx: mpsc::Sender<MutationEvent>,
    engine: Arc<SyncEngine>,
}

impl MutationSender {
    /// Queue an event, waiting for room in the channel.
    pub async fn send(&self, event: MutationEvent) -> Result<(), SyncError> {
        self.tx.send(event).await.map_err(|_| SyncError::ChannelClosed)
    }

    /// Queue an event without waiting.
    ///
    /// When the channel is full or closed the entity is parked in the
    /// failed set instead, so the mutation itself always goes through.
    pub fn notify(&self, event: MutationEvent) {
        if let Err(e) = self.tx.try_send(event) {
            let (event, reason) = match e {
                mpsc::error::TrySendError::Full(event) => (event, "channel full"),
                mpsc::error::TrySendError::Closed(event) => (event, "channel closed"),
            };
            self.engine.park(event.entity(), reason);
        }
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }
}
