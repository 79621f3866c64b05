// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::document::Document;
use crate::search::SearchRequest;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Index '{0}' already exists")]
    IndexExists(String),
    #[error("Mapping conflict on '{index}': {reason}")]
    MappingConflict { index: String, reason: String },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Whether retrying the same call could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Backend(_))
    }
}

/// One step of an atomic alias update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasAction {
    Add { alias: String, index: String },
    Remove { alias: String, index: String },
}

impl AliasAction {
    pub fn add(alias: impl Into<String>, index: impl Into<String>) -> Self {
        AliasAction::Add { alias: alias.into(), index: index.into() }
    }

    pub fn remove(alias: impl Into<String>, index: impl Into<String>) -> Self {
        AliasAction::Remove { alias: alias.into(), index: index.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub source: Value,
    /// One value per sort key of the request; feeds `search_after`
    #[serde(default)]
    pub sort: Vec<Value>,
}

/// One page of matches plus the total match count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHits {
    pub total: u64,
    pub hits: Vec<SearchHit>,
}

/// Result of a bulk write
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkResult {
    /// Number of documents written
    pub written: usize,
    /// Per-document failures: (document id, reason)
    pub failed: Vec<(String, String)>,
}

impl BulkResult {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Document index backend.
///
/// `name` arguments accept either a physical index or an alias; writes go
/// through an alias that must resolve to exactly one index.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Whether an index or alias of that name exists.
    async fn exists(&self, name: &str) -> Result<bool, StorageError>;

    /// Create a physical index from a `{settings, mappings}` body.
    async fn create_index(&self, index: &str, body: &Value) -> Result<(), StorageError>;

    async fn delete_index(&self, index: &str) -> Result<(), StorageError>;

    /// `{"properties": {...}}` of the index behind `name`.
    async fn get_mapping(&self, name: &str) -> Result<Value, StorageError>;

    /// Merge a mapping into an existing index. Changing the type or
    /// analyzer of an existing field fails with [`StorageError::MappingConflict`].
    async fn put_mapping(&self, name: &str, mapping: &Value) -> Result<(), StorageError>;

    /// Indices bound to `alias`; empty when the alias does not exist.
    async fn get_alias(&self, alias: &str) -> Result<Vec<String>, StorageError>;

    /// Apply every action or none.
    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), StorageError>;

    /// Upsert (last write wins).
    async fn index_document(&self, name: &str, doc: &Document) -> Result<(), StorageError>;

    /// Returns whether a document was removed.
    async fn delete_document(&self, name: &str, id: &str) -> Result<bool, StorageError>;

    async fn get_document(&self, name: &str, id: &str) -> Result<Option<Value>, StorageError>;

    /// Write a batch of documents.
    /// Default implementation falls back to sequential upserts.
    async fn bulk_index(&self, name: &str, docs: &[Document]) -> Result<BulkResult, StorageError> {
        let mut result = BulkResult::default();
        for doc in docs {
            match self.index_document(name, doc).await {
                Ok(()) => result.written += 1,
                Err(e) => result.failed.push((doc.id.to_string(), e.to_string())),
            }
        }
        Ok(result)
    }

    async fn search(&self, name: &str, request: &SearchRequest) -> Result<SearchHits, StorageError>;

    /// Make recent writes visible to search. No-op for stores that are
    /// always consistent.
    async fn refresh(&self, _name: &str) -> Result<(), StorageError> {
        Ok(())
    }
}
