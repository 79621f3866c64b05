// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};

use super::matcher::{compare, evaluate, field_table, is_after, mapping_conflict, sort_values, FieldTable, StoredDoc};
use super::traits::{AliasAction, DocumentStore, SearchHit, SearchHits, StorageError};
use crate::document::Document;
use crate::search::SearchRequest;

struct MemoryIndex {
    mapping: Value,
    table: FieldTable,
    docs: BTreeMap<String, StoredDoc>,
}

impl MemoryIndex {
    fn new(mapping: Value) -> Self {
        let table = field_table(&mapping);
        Self {
            mapping,
            table,
            docs: BTreeMap::new(),
        }
    }
}

/// Document store held in process memory.
///
/// Implements the index, alias and mapping semantics of the real backend
/// closely enough to run the full lifecycle and query paths in tests:
/// analyzers, `copy_to`, relevance, sorting with missing-last and
/// conflicting mapping updates.
pub struct InMemoryStore {
    indices: DashMap<String, MemoryIndex>,
    /// alias → indices; one lock so alias updates are atomic
    aliases: RwLock<HashMap<String, Vec<String>>>,
    max_result_window: usize,
}

/// Elasticsearch's default `index.max_result_window`.
pub const DEFAULT_MAX_RESULT_WINDOW: usize = 10_000;

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            indices: DashMap::new(),
            aliases: RwLock::new(HashMap::new()),
            max_result_window: DEFAULT_MAX_RESULT_WINDOW,
        }
    }

    /// Cap on `offset + limit` for offset paging. `search_after` paging is
    /// not bounded by it.
    #[must_use]
    pub fn with_max_result_window(mut self, window: usize) -> Self {
        self.max_result_window = window;
        self
    }

    /// Physical index names, sorted.
    #[must_use]
    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indices.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Document count of one physical index (0 when absent).
    #[must_use]
    pub fn doc_count(&self, index: &str) -> usize {
        self.indices.get(index).map_or(0, |i| i.docs.len())
    }

    /// Drop all indices and aliases
    pub fn clear(&self) {
        self.aliases.write().clear();
        self.indices.clear();
    }

    fn resolve(&self, name: &str) -> Vec<String> {
        if self.indices.contains_key(name) {
            return vec![name.to_string()];
        }
        self.aliases.read().get(name).cloned().unwrap_or_default()
    }

    fn resolve_one(&self, name: &str) -> Result<String, StorageError> {
        let mut indices = self.resolve(name);
        match indices.len() {
            0 => Err(StorageError::NotFound(name.to_string())),
            1 => Ok(indices.remove(0)),
            n => Err(StorageError::InvalidRequest(format!(
                "'{}' points at {} indices; writes need exactly one",
                name, n
            ))),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(!self.resolve(name).is_empty())
    }

    async fn create_index(&self, index: &str, body: &Value) -> Result<(), StorageError> {
        if self.indices.contains_key(index) || self.aliases.read().contains_key(index) {
            return Err(StorageError::IndexExists(index.to_string()));
        }
        let mapping = body
            .get("mappings")
            .cloned()
            .unwrap_or_else(|| json!({ "properties": {} }));
        self.indices.insert(index.to_string(), MemoryIndex::new(mapping));
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), StorageError> {
        if self.indices.remove(index).is_none() {
            return Err(StorageError::NotFound(index.to_string()));
        }
        let mut aliases = self.aliases.write();
        for targets in aliases.values_mut() {
            targets.retain(|t| t != index);
        }
        aliases.retain(|_, targets| !targets.is_empty());
        Ok(())
    }

    async fn get_mapping(&self, name: &str) -> Result<Value, StorageError> {
        let index = self.resolve_one(name)?;
        self.indices
            .get(&index)
            .map(|i| i.mapping.clone())
            .ok_or(StorageError::NotFound(index))
    }

    async fn put_mapping(&self, name: &str, mapping: &Value) -> Result<(), StorageError> {
        let index = self.resolve_one(name)?;
        let mut entry = self
            .indices
            .get_mut(&index)
            .ok_or_else(|| StorageError::NotFound(index.clone()))?;

        let proposed = field_table(mapping);
        if let Some(reason) = mapping_conflict(&entry.table, &proposed) {
            return Err(StorageError::MappingConflict { index, reason });
        }

        let mut merged: Map<String, Value> = entry
            .mapping
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        if let Some(props) = mapping.get("properties").and_then(Value::as_object) {
            for (name, prop) in props {
                merged.insert(name.clone(), prop.clone());
            }
        }
        let merged = json!({ "properties": merged });
        entry.table = field_table(&merged);
        entry.mapping = merged;
        Ok(())
    }

    async fn get_alias(&self, alias: &str) -> Result<Vec<String>, StorageError> {
        Ok(self.aliases.read().get(alias).cloned().unwrap_or_default())
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), StorageError> {
        let mut aliases = self.aliases.write();
        // validate against a copy so a failing action leaves nothing applied
        let mut next = aliases.clone();
        for action in actions {
            match action {
                AliasAction::Add { alias, index } => {
                    if !self.indices.contains_key(index) {
                        return Err(StorageError::NotFound(index.clone()));
                    }
                    let targets = next.entry(alias.clone()).or_default();
                    if !targets.contains(index) {
                        targets.push(index.clone());
                    }
                }
                AliasAction::Remove { alias, index } => {
                    let targets = next
                        .get_mut(alias)
                        .filter(|t| t.contains(index))
                        .ok_or_else(|| StorageError::NotFound(format!("{} -> {}", alias, index)))?;
                    targets.retain(|t| t != index);
                    if targets.is_empty() {
                        next.remove(alias);
                    }
                }
            }
        }
        *aliases = next;
        Ok(())
    }

    async fn index_document(&self, name: &str, doc: &Document) -> Result<(), StorageError> {
        let index = self.resolve_one(name)?;
        let mut entry = self
            .indices
            .get_mut(&index)
            .ok_or_else(|| StorageError::NotFound(index.clone()))?;
        let id = doc.id.to_string();
        let stored = StoredDoc::new(id.clone(), doc.fields.clone(), &entry.table);
        entry.docs.insert(id, stored);
        Ok(())
    }

    async fn delete_document(&self, name: &str, id: &str) -> Result<bool, StorageError> {
        let index = self.resolve_one(name)?;
        let mut entry = self
            .indices
            .get_mut(&index)
            .ok_or_else(|| StorageError::NotFound(index.clone()))?;
        Ok(entry.docs.remove(id).is_some())
    }

    async fn get_document(&self, name: &str, id: &str) -> Result<Option<Value>, StorageError> {
        for index in self.resolve(name) {
            if let Some(entry) = self.indices.get(&index) {
                if let Some(doc) = entry.docs.get(id) {
                    return Ok(Some(Value::Object(doc.source.clone())));
                }
            }
        }
        Ok(None)
    }

    async fn search(&self, name: &str, request: &SearchRequest) -> Result<SearchHits, StorageError> {
        let indices = self.resolve(name);
        if indices.is_empty() {
            return Err(StorageError::NotFound(name.to_string()));
        }
        if request.search_after.is_none() && request.offset + request.limit > self.max_result_window {
            return Err(StorageError::InvalidRequest(format!(
                "Result window is too large, from + size must be less than or equal to [{}] but was [{}]",
                self.max_result_window,
                request.offset + request.limit
            )));
        }

        let mut tables: Vec<FieldTable> = Vec::new();
        let mut matched: Vec<(StoredDoc, f32, usize)> = Vec::new();
        for index in &indices {
            let Some(entry) = self.indices.get(index) else {
                continue;
            };
            for doc in entry.docs.values() {
                if let Some(score) = evaluate(&request.query.root, doc, &entry.table) {
                    matched.push((doc.clone(), score, tables.len()));
                }
            }
            tables.push(entry.table.clone());
        }

        matched.sort_by(|a, b| compare((&a.0, a.1), (&b.0, b.1), &request.sort, &tables[a.2]));

        let total = matched.len() as u64;
        let skip = match &request.search_after {
            Some(cursor) => matched
                .iter()
                .take_while(|(doc, score, t)| !is_after(doc, *score, &request.sort, &tables[*t], cursor))
                .count(),
            None => request.offset,
        };
        let hits = matched
            .into_iter()
            .skip(skip)
            .take(request.limit)
            .map(|(doc, score, t)| SearchHit {
                sort: sort_values(&doc, score, &request.sort, &tables[t]),
                id: doc.id,
                score,
                source: Value::Object(doc.source),
            })
            .collect();
        Ok(SearchHits { total, hits })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;
    use crate::schema::{Analyzer, DocumentSchema};
    use crate::search::{Query, SortKey};
    use uuid::Uuid;

    fn schema() -> DocumentSchema {
        DocumentSchema::new("company")
            .keyword("id")
            .text("name", Analyzer::LowercaseKeyword)
            .text("name_trigram", Analyzer::Trigram)
            .copy_to("name", "name_trigram")
    }

    fn doc(name: &str) -> Document {
        let mut fields = Map::new();
        fields.insert("name".into(), json!(name));
        Document::new(EntityKind::Company, Uuid::new_v4(), fields)
    }

    async fn store_with_alias() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.create_index("idx-1", &schema().to_index_body()).await.unwrap();
        store
            .update_aliases(&[AliasAction::add("read", "idx-1"), AliasAction::add("write", "idx-1")])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.index_names().is_empty());
        assert!(!store.exists("anything").await.unwrap());
    }

    #[tokio::test]
    async fn test_index_and_get_through_alias() {
        let store = store_with_alias().await;
        let d = doc("Acme");
        store.index_document("write", &d).await.unwrap();

        let got = store.get_document("read", &d.id.to_string()).await.unwrap();
        assert_eq!(got, Some(d.to_value()));
        assert_eq!(store.doc_count("idx-1"), 1);
    }

    #[tokio::test]
    async fn test_upsert_is_last_write_wins() {
        let store = store_with_alias().await;
        let mut d = doc("Acme");
        store.index_document("write", &d).await.unwrap();
        d.fields.insert("name".into(), json!("Acme Ltd"));
        store.index_document("write", &d).await.unwrap();

        let got = store.get_document("read", &d.id.to_string()).await.unwrap().unwrap();
        assert_eq!(got["name"], json!("Acme Ltd"));
        assert_eq!(store.doc_count("idx-1"), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_document_is_ok() {
        let store = store_with_alias().await;
        assert!(!store.delete_document("write", "nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_existing_index_fails() {
        let store = store_with_alias().await;
        let err = store.create_index("idx-1", &json!({})).await.unwrap_err();
        assert_eq!(err, StorageError::IndexExists("idx-1".into()));
    }

    #[tokio::test]
    async fn test_alias_update_is_atomic() {
        let store = store_with_alias().await;
        let err = store
            .update_aliases(&[
                AliasAction::remove("write", "idx-1"),
                AliasAction::add("write", "missing-index"),
            ])
            .await;
        assert!(err.is_err());
        assert_eq!(store.get_alias("write").await.unwrap(), vec!["idx-1".to_string()]);
    }

    #[tokio::test]
    async fn test_write_through_multi_index_alias_fails() {
        let store = store_with_alias().await;
        store.create_index("idx-2", &schema().to_index_body()).await.unwrap();
        store.update_aliases(&[AliasAction::add("write", "idx-2")]).await.unwrap();
        let err = store.index_document("write", &doc("x")).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_put_mapping_adds_fields_and_rejects_changes() {
        let store = store_with_alias().await;
        let extended = schema().keyword("company_number");
        store.put_mapping("write", &extended.to_mapping()).await.unwrap();
        let mapping = store.get_mapping("read").await.unwrap();
        assert_eq!(mapping["properties"]["company_number"]["type"], json!("keyword"));

        let changed = DocumentSchema::new("company").text("name", Analyzer::English);
        let err = store.put_mapping("write", &changed.to_mapping()).await.unwrap_err();
        assert!(matches!(err, StorageError::MappingConflict { .. }));
    }

    #[tokio::test]
    async fn test_delete_index_drops_aliases() {
        let store = store_with_alias().await;
        store.delete_index("idx-1").await.unwrap();
        assert!(store.get_alias("read").await.unwrap().is_empty());
        assert!(!store.exists("write").await.unwrap());
    }

    #[tokio::test]
    async fn test_search_window_and_total() {
        let store = store_with_alias().await;
        for name in ["b", "a", "c", "e", "d"] {
            store.index_document("write", &doc(name)).await.unwrap();
        }
        let request = SearchRequest::new(Query::match_all())
            .with_sort(vec![SortKey::asc("name")])
            .with_window(1, 2);
        let hits = store.search("read", &request).await.unwrap();
        assert_eq!(hits.total, 5);
        let names: Vec<_> = hits.hits.iter().map(|h| h.source["name"].clone()).collect();
        assert_eq!(names, vec![json!("b"), json!("c")]);
    }

    #[tokio::test]
    async fn test_offset_paging_is_capped_by_result_window() {
        let store = store_with_alias().await.with_max_result_window(4);
        for name in ["a", "b", "c"] {
            store.index_document("write", &doc(name)).await.unwrap();
        }
        let request = SearchRequest::new(Query::match_all()).with_window(3, 2);
        let err = store.search("read", &request).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_search_after_resumes_past_result_window() {
        let store = store_with_alias().await.with_max_result_window(2);
        for name in ["b", "a", "c", "e", "d"] {
            store.index_document("write", &doc(name)).await.unwrap();
        }
        let first = SearchRequest::new(Query::match_all())
            .with_sort(vec![SortKey::asc("name"), SortKey::asc("id")])
            .with_window(0, 2);

        let mut names = Vec::new();
        let mut request = first.clone();
        loop {
            let hits = store.search("read", &request).await.unwrap();
            assert_eq!(hits.total, 5);
            let Some(last) = hits.hits.last() else { break };
            assert_eq!(last.sort.len(), 2);
            request = first.clone().with_search_after(last.sort.clone());
            names.extend(hits.hits.iter().map(|h| h.source["name"].clone()));
        }
        assert_eq!(names, vec![json!("a"), json!("b"), json!("c"), json!("d"), json!("e")]);
    }

    #[tokio::test]
    async fn test_hits_carry_sort_values_with_null_for_missing() {
        let store = store_with_alias().await;
        let named = doc("acme");
        let mut unnamed = doc("x");
        unnamed.fields.remove("name");
        store.index_document("write", &named).await.unwrap();
        store.index_document("write", &unnamed).await.unwrap();

        let request = SearchRequest::new(Query::match_all()).with_sort(vec![SortKey::desc("name")]);
        let hits = store.search("read", &request).await.unwrap();
        assert_eq!(hits.hits[0].sort, vec![json!("acme")]);
        assert_eq!(hits.hits[1].sort, vec![Value::Null]);
    }

    #[tokio::test]
    async fn test_search_unknown_alias_fails() {
        let store = InMemoryStore::new();
        let err = store.search("nope", &SearchRequest::new(Query::match_all())).await;
        assert!(matches!(err, Err(StorageError::NotFound(_))));
    }
}
