// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Read access to the primary store.
//!
//! The relational store is owned by the CRUD layer. The search layer only
//! needs four reads: one record, a page of records, a count, and the ids of
//! records that point at a given record through a named relation.

mod memory;

pub use memory::InMemorySource;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::entity::{Entity, EntityKind, EntityRef};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Primary store unavailable: {0}")]
    Unavailable(String),
    #[error("Relation '{relation}' is not defined on {kind}")]
    UnknownRelation { kind: EntityKind, relation: String },
}

/// Primary-store reads used by sync and resync.
#[async_trait]
pub trait EntitySource: Send + Sync {
    /// Current state of one record with its related rows loaded.
    /// `None` when the record no longer exists.
    async fn fetch(&self, entity: EntityRef) -> Result<Option<Entity>, SourceError>;

    /// One page of records of `kind`, ordered by id.
    async fn scan(&self, kind: EntityKind, offset: usize, limit: usize) -> Result<Vec<Entity>, SourceError>;

    async fn count(&self, kind: EntityKind) -> Result<usize, SourceError>;

    /// Ids of `source_kind` records whose `relation` points at `target`.
    async fn referencing(
        &self,
        source_kind: EntityKind,
        relation: &str,
        target: Uuid,
    ) -> Result<Vec<Uuid>, SourceError>;
}
