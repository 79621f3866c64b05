// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Index Manager
//!
//! Owns the physical index versions and the two aliases of every app.
//!
//! # Layout
//!
//! ```text
//! datahub-company-read  ──┐
//!                         ├──► datahub-company-3f2a9c01d4   (mapping hash prefix)
//! datahub-company-write ──┘
//! ```
//!
//! # Versioned migration
//!
//! ```text
//! 1. create   datahub-company-<new>
//! 2. swap     write: <old> → <new>        (single alias update)
//! 3. backfill <new> from the primary store
//! 4. swap     read:  <old> → <new>
//! 5. drop     <old>
//! ```
//!
//! The write alias always resolves to exactly one index. If step 3 fails
//! the read alias stays on the old version and the next migration resumes
//! from step 3.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::SearchConfig;
use crate::metrics;
use crate::registry::{AppRegistry, RegistryError};
use crate::resilience::{retry_if, RetryConfig};
use crate::schema::DocumentSchema;
use crate::storage::{AliasAction, DocumentStore, StorageError};
use crate::sync::SyncError;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("A migration of '{0}' is already running")]
    MigrationInProgress(String),
    #[error("Write alias '{alias}' is bound to {count} indices")]
    AmbiguousWriteAlias { alias: String, count: usize },
    #[error("Backfill of '{index}' for '{app}' failed: {reason}")]
    Backfill {
        app: String,
        index: String,
        reason: String,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result of [`IndexManager::ensure_index`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum InitOutcome {
    Created { index: String },
    Existing { index: String },
}

/// Result of [`IndexManager::migrate_mapping`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MigrationOutcome {
    /// Aliases were absent; a fresh index was created
    Created { index: String },
    /// The write index already carries the current mapping
    Unchanged { index: String },
    /// Mapping merged into the existing write index
    UpdatedInPlace { index: String },
    /// New index version built and both aliases moved
    Migrated {
        from: String,
        to: String,
        backfilled: u64,
        /// In-place update attempt that was refused, if one was made
        conflict: Option<String>,
    },
}

/// Fills a freshly created index with every document of an app.
#[async_trait]
pub trait Backfill: Send + Sync {
    /// Write all documents of `app` into `index`; returns how many.
    async fn backfill(&self, app: &str, index: &str) -> Result<u64, SyncError>;
}

/// Creates, aliases and migrates physical indices.
pub struct IndexManager {
    store: Arc<dyn DocumentStore>,
    registry: Arc<AppRegistry>,
    config: Arc<SearchConfig>,
    retry: RetryConfig,
    migrating: Mutex<HashSet<String>>,
}

/// Marks one app as migrating until dropped.
struct MigrationGuard<'a> {
    active: &'a Mutex<HashSet<String>>,
    app: String,
}

impl Drop for MigrationGuard<'_> {
    fn drop(&mut self) {
        self.active.lock().remove(&self.app);
    }
}

impl IndexManager {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        registry: Arc<AppRegistry>,
        config: Arc<SearchConfig>,
    ) -> Self {
        Self {
            store,
            registry,
            config,
            retry: RetryConfig::startup(),
            migrating: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn read_alias(&self, app: &str) -> String {
        self.config.read_alias(app)
    }

    pub fn write_alias(&self, app: &str) -> String {
        self.config.write_alias(app)
    }

    /// Physical index name for the app's current schema.
    pub fn target_index(&self, app: &str) -> Result<String, LifecycleError> {
        let schema = self.registry.get(app)?.schema();
        Ok(self.config.index_name(app, &schema.mapping_hash()))
    }

    /// True iff the write alias resolves to an existing index.
    pub async fn is_initialized(&self, app: &str) -> Result<bool, LifecycleError> {
        self.registry.get(app)?;
        let indices = self.store.get_alias(&self.write_alias(app)).await?;
        match indices.first() {
            Some(index) => Ok(self.store.exists(index).await?),
            None => Ok(false),
        }
    }

    /// Create the index and both aliases unless the write alias exists.
    pub async fn ensure_index(&self, app: &str) -> Result<InitOutcome, LifecycleError> {
        let schema = self.registry.get(app)?.schema();
        let write_alias = self.write_alias(app);

        let bound = self.store.get_alias(&write_alias).await?;
        if let Some(index) = bound.first() {
            debug!(app = %app, index = %index, "Index already initialized");
            return Ok(InitOutcome::Existing { index: index.clone() });
        }

        let index = self.config.index_name(app, &schema.mapping_hash());
        self.create_physical(app, &index, schema).await?;

        let mut actions = vec![AliasAction::add(&write_alias, &index)];
        let read_alias = self.read_alias(app);
        if self.store.get_alias(&read_alias).await?.is_empty() {
            actions.push(AliasAction::add(&read_alias, &index));
        }
        self.swap_aliases(app, "bind_aliases", &actions).await?;

        info!(app = %app, index = %index, "Index created and aliased");
        Ok(InitOutcome::Created { index })
    }

    /// Bring the app's index in line with its current schema.
    ///
    /// Only one migration per app runs at a time; a concurrent call fails
    /// with [`LifecycleError::MigrationInProgress`].
    #[instrument(skip(self, backfill))]
    pub async fn migrate_mapping(
        &self,
        app: &str,
        force: bool,
        backfill: &dyn Backfill,
    ) -> Result<MigrationOutcome, LifecycleError> {
        let _guard = self.begin_migration(app)?;
        let schema = self.registry.get(app)?.schema();
        let write_alias = self.write_alias(app);
        let read_alias = self.read_alias(app);

        let bound = self.store.get_alias(&write_alias).await?;
        let current = match bound.as_slice() {
            [] => {
                let (InitOutcome::Created { index } | InitOutcome::Existing { index }) =
                    self.ensure_index(app).await?;
                return Ok(MigrationOutcome::Created { index });
            }
            [index] => index.clone(),
            _ => {
                return Err(LifecycleError::AmbiguousWriteAlias {
                    alias: write_alias,
                    count: bound.len(),
                })
            }
        };

        let target = self.config.index_name(app, &schema.mapping_hash());
        let readers = self.store.get_alias(&read_alias).await?;

        if current == target {
            match readers.as_slice() {
                [reader] if *reader == target => {
                    return Ok(MigrationOutcome::Unchanged { index: target });
                }
                _ => {
                    // An earlier migration stopped after the write swap
                    let from = readers.first().cloned().unwrap_or_else(|| target.clone());
                    warn!(app = %app, from = %from, to = %target, "Resuming interrupted migration");
                    return self.finish_migration(app, &from, &target, &readers, backfill, None).await;
                }
            }
        }

        let mut conflict = None;
        if force {
            match self.store.put_mapping(&write_alias, &schema.to_mapping()).await {
                Ok(()) => {
                    metrics::record_index_operation(app, "update_mapping", true);
                    info!(app = %app, index = %current, "Mapping updated in place");
                    return Ok(MigrationOutcome::UpdatedInPlace { index: current });
                }
                Err(StorageError::MappingConflict { reason, .. }) => {
                    metrics::record_index_operation(app, "update_mapping", false);
                    warn!(app = %app, index = %current, reason = %reason, "In-place mapping update refused, migrating");
                    conflict = Some(reason);
                }
                Err(e) => return Err(e.into()),
            }
        }

        if self.store.exists(&target).await? {
            // Orphan from an attempt that failed before the write swap
            warn!(app = %app, index = %target, "Dropping stale index version");
            self.store.delete_index(&target).await?;
        }
        self.create_physical(app, &target, schema).await?;
        self.swap_aliases(
            app,
            "swap_write_alias",
            &[
                AliasAction::remove(&write_alias, &current),
                AliasAction::add(&write_alias, &target),
            ],
        )
        .await?;
        info!(app = %app, from = %current, to = %target, "Write alias moved");

        self.finish_migration(app, &current, &target, &readers, backfill, conflict).await
    }

    /// Backfill `target`, move the read alias onto it and drop `from`.
    async fn finish_migration(
        &self,
        app: &str,
        from: &str,
        target: &str,
        readers: &[String],
        backfill: &dyn Backfill,
        conflict: Option<String>,
    ) -> Result<MigrationOutcome, LifecycleError> {
        let backfilled = backfill
            .backfill(app, target)
            .await
            .map_err(|e| LifecycleError::Backfill {
                app: app.to_string(),
                index: target.to_string(),
                reason: e.to_string(),
            })?;

        let read_alias = self.read_alias(app);
        let mut actions: Vec<AliasAction> = readers
            .iter()
            .filter(|index| index.as_str() != target)
            .map(|index| AliasAction::remove(&read_alias, index))
            .collect();
        if !readers.iter().any(|index| index == target) {
            actions.push(AliasAction::add(&read_alias, target));
        }
        if !actions.is_empty() {
            self.swap_aliases(app, "swap_read_alias", &actions).await?;
        }

        if from != target {
            match self.store.delete_index(from).await {
                Ok(()) => metrics::record_index_operation(app, "drop", true),
                Err(e) => {
                    // Aliases already moved; a leftover index is harmless
                    metrics::record_index_operation(app, "drop", false);
                    warn!(app = %app, index = %from, error = %e, "Failed to drop old index version");
                }
            }
        }

        info!(app = %app, from = %from, to = %target, backfilled, "Migration complete");
        Ok(MigrationOutcome::Migrated {
            from: from.to_string(),
            to: target.to_string(),
            backfilled,
            conflict,
        })
    }

    fn begin_migration(&self, app: &str) -> Result<MigrationGuard<'_>, LifecycleError> {
        let mut active = self.migrating.lock();
        if !active.insert(app.to_string()) {
            return Err(LifecycleError::MigrationInProgress(app.to_string()));
        }
        Ok(MigrationGuard {
            active: &self.migrating,
            app: app.to_string(),
        })
    }

    async fn create_physical(
        &self,
        app: &str,
        index: &str,
        schema: &DocumentSchema,
    ) -> Result<(), LifecycleError> {
        let body = schema.to_index_body();
        let result = retry_if(
            "create_index",
            &self.retry,
            || self.store.create_index(index, &body),
            StorageError::is_transient,
        )
        .await;
        metrics::record_index_operation(app, "create", result.is_ok());
        result.map_err(Into::into)
    }

    async fn swap_aliases(
        &self,
        app: &str,
        operation: &str,
        actions: &[AliasAction],
    ) -> Result<(), LifecycleError> {
        let result = retry_if(
            operation,
            &self.retry,
            || self.store.update_aliases(actions),
            StorageError::is_transient,
        )
        .await;
        metrics::record_index_operation(app, operation, result.is_ok());
        result.map_err(Into::into)
    }
}
