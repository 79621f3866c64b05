// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Change Sync
//!
//! Keeps documents in step with the primary store.
//!
//! ```text
//! CRUD layer ──MutationEvent──► MutationSender ──mpsc──► worker
//!                                                          │
//!                                         SyncEngine::handle(event)
//!                                           ├─ own document: fetch → map → upsert / delete
//!                                           └─ dependents:   referencing(kind, relation, id)
//!                                                            → fetch → map → upsert
//! ```
//!
//! A failed document write never reaches the caller of the primary
//! mutation. It is logged, counted and parked in a failed set that
//! [`SyncEngine::retry_failed`] re-syncs. Full rebuilds go through the
//! [`Resyncer`], which also backfills new index versions during migrations.

mod engine;
mod resync;

pub use engine::{MutationSender, SuspendGuard, SyncEngine};
pub use resync::{BatchResult, ResyncReport, Resyncer};

use serde::Serialize;
use thiserror::Error;

use crate::entity::EntityRef;
use crate::mapping::MappingError;
use crate::registry::RegistryError;
use crate::source::SourceError;
use crate::storage::StorageError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("{failed} of {total} documents could not be written")]
    Incomplete { failed: usize, total: usize },
    #[error("Mutation channel closed")]
    ChannelClosed,
}

impl SyncError {
    /// Metric label.
    pub fn error_type(&self) -> &'static str {
        match self {
            SyncError::Source(_) => "source",
            SyncError::Mapping(_) => "mapping",
            SyncError::Registry(_) => "registry",
            SyncError::Storage(_) => "storage",
            SyncError::Incomplete { .. } => "incomplete",
            SyncError::ChannelClosed => "channel_closed",
        }
    }
}

/// A change made by the CRUD layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MutationEvent {
    /// Record created or updated
    Saved(EntityRef),
    /// Record removed from the primary store
    Deleted(EntityRef),
    /// Many-to-many membership of `relation` changed on the record
    RelationChanged { entity: EntityRef, relation: String },
}

impl MutationEvent {
    pub fn entity(&self) -> EntityRef {
        match self {
            MutationEvent::Saved(entity)
            | MutationEvent::Deleted(entity)
            | MutationEvent::RelationChanged { entity, .. } => *entity,
        }
    }
}

/// What one [`MutationEvent`] did to the index.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    /// Documents written (own document and dependents)
    pub indexed: Vec<EntityRef>,
    /// Documents removed
    pub deleted: Vec<EntityRef>,
    /// Documents left alone because their kind is disconnected
    pub skipped: Vec<EntityRef>,
    /// Documents that could not be synced, with the reason
    pub failed: Vec<(EntityRef, String)>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub(crate) fn merge(&mut self, other: SyncReport) {
        self.indexed.extend(other.indexed);
        self.deleted.extend(other.deleted);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
    }
}
