// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Elasticsearch document store over the REST API.
//!
//! # Endpoints
//!
//! ```text
//! HEAD   /{name}                  exists
//! PUT    /{index}                 create_index
//! DELETE /{index}                 delete_index
//! GET    /{name}/_mapping         get_mapping
//! PUT    /{name}/_mapping         put_mapping
//! GET    /_alias/{alias}          get_alias
//! POST   /_aliases                update_aliases (atomic)
//! PUT    /{name}/_doc/{id}        index_document
//! DELETE /{name}/_doc/{id}        delete_document
//! GET    /{name}/_doc/{id}        get_document
//! POST   /{name}/_bulk            bulk_index (NDJSON)
//! POST   /{name}/_search          search
//! POST   /{name}/_refresh         refresh
//! ```

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::traits::{AliasAction, BulkResult, DocumentStore, SearchHit, SearchHits, StorageError};
use crate::config::SearchConfig;
use crate::document::Document;
use crate::search::{EsTranslator, SearchRequest};

pub struct ElasticsearchStore {
    base_url: String,
    http_client: reqwest::Client,
}

impl ElasticsearchStore {
    /// Fails when the HTTP client cannot be built (e.g. no TLS backend).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, StorageError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("datahub-search/0.1")
            .build()
            .map_err(|e| StorageError::InvalidRequest(format!("HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self, StorageError> {
        Self::new(config.es_url.clone(), config.request_timeout())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, Value), StorageError> {
        let mut request = self.http_client.request(method.clone(), self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("{} {}: {}", method, path, e)))?;
        Self::read(response).await
    }

    async fn read(response: reqwest::Response) -> Result<(StatusCode, Value), StorageError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok((status, body))
    }

    fn error_type(body: &Value) -> &str {
        body.pointer("/error/type").and_then(Value::as_str).unwrap_or("")
    }

    fn error_reason(body: &Value) -> String {
        body.pointer("/error/reason")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string())
    }

    /// Map a non-success response onto [`StorageError`].
    fn failure(name: &str, status: StatusCode, body: &Value) -> StorageError {
        match (status, Self::error_type(body)) {
            (StatusCode::NOT_FOUND, _) => StorageError::NotFound(name.to_string()),
            (_, "resource_already_exists_exception") => StorageError::IndexExists(name.to_string()),
            (StatusCode::BAD_REQUEST, "illegal_argument_exception") => StorageError::MappingConflict {
                index: name.to_string(),
                reason: Self::error_reason(body),
            },
            (StatusCode::BAD_REQUEST, _) => StorageError::InvalidRequest(Self::error_reason(body)),
            _ => StorageError::Backend(format!("{}: {}", status, Self::error_reason(body))),
        }
    }

    fn expect_success(name: &str, status: StatusCode, body: Value) -> Result<Value, StorageError> {
        if status.is_success() {
            Ok(body)
        } else {
            Err(Self::failure(name, status, &body))
        }
    }

    fn bulk_body(docs: &[Document]) -> String {
        let mut out = String::new();
        for doc in docs {
            out.push_str(&json!({ "index": { "_id": doc.id.to_string() } }).to_string());
            out.push('\n');
            out.push_str(&String::from_utf8_lossy(&doc.to_bytes()));
            out.push('\n');
        }
        out
    }

    fn parse_bulk_response(body: &Value) -> BulkResult {
        let mut result = BulkResult::default();
        let items = body.get("items").and_then(Value::as_array).cloned().unwrap_or_default();
        for item in items {
            let Some(op) = item.get("index") else {
                continue;
            };
            let id = op.get("_id").and_then(Value::as_str).unwrap_or_default().to_string();
            match op.get("error") {
                Some(error) => result.failed.push((id, error.to_string())),
                None => result.written += 1,
            }
        }
        result
    }

    fn parse_hits(body: &Value) -> SearchHits {
        let total = body
            .pointer("/hits/total/value")
            .or_else(|| body.pointer("/hits/total"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let hits = body
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .map(|hits| {
                hits.iter()
                    .map(|hit| SearchHit {
                        id: hit.get("_id").and_then(Value::as_str).unwrap_or_default().to_string(),
                        score: hit.get("_score").and_then(Value::as_f64).unwrap_or(0.0) as f32,
                        source: hit.get("_source").cloned().unwrap_or(Value::Null),
                        sort: hit.get("sort").and_then(Value::as_array).cloned().unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        SearchHits { total, hits }
    }
}

#[async_trait]
impl DocumentStore for ElasticsearchStore {
    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        let response = self
            .http_client
            .head(self.url(name))
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(StorageError::Backend(format!("HEAD {}: {}", name, status))),
        }
    }

    async fn create_index(&self, index: &str, body: &Value) -> Result<(), StorageError> {
        let (status, response) = self.send(Method::PUT, index, Some(body)).await?;
        Self::expect_success(index, status, response)?;
        debug!(index = %index, "Created index");
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), StorageError> {
        let (status, response) = self.send(Method::DELETE, index, None).await?;
        Self::expect_success(index, status, response)?;
        Ok(())
    }

    async fn get_mapping(&self, name: &str) -> Result<Value, StorageError> {
        let (status, response) = self.send(Method::GET, &format!("{}/_mapping", name), None).await?;
        let body = Self::expect_success(name, status, response)?;
        // {"<physical index>": {"mappings": {...}}}
        body.as_object()
            .and_then(|indices| indices.values().next())
            .and_then(|index| index.get("mappings"))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn put_mapping(&self, name: &str, mapping: &Value) -> Result<(), StorageError> {
        let (status, response) = self
            .send(Method::PUT, &format!("{}/_mapping", name), Some(mapping))
            .await?;
        Self::expect_success(name, status, response)?;
        Ok(())
    }

    async fn get_alias(&self, alias: &str) -> Result<Vec<String>, StorageError> {
        let (status, response) = self.send(Method::GET, &format!("_alias/{}", alias), None).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let body = Self::expect_success(alias, status, response)?;
        let mut indices: Vec<String> = body
            .as_object()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        indices.sort();
        Ok(indices)
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), StorageError> {
        let actions: Vec<Value> = actions
            .iter()
            .map(|action| match action {
                AliasAction::Add { alias, index } => json!({ "add": { "index": index, "alias": alias } }),
                AliasAction::Remove { alias, index } => {
                    json!({ "remove": { "index": index, "alias": alias } })
                }
            })
            .collect();
        let body = json!({ "actions": actions });
        let (status, response) = self.send(Method::POST, "_aliases", Some(&body)).await?;
        Self::expect_success("_aliases", status, response)?;
        Ok(())
    }

    async fn index_document(&self, name: &str, doc: &Document) -> Result<(), StorageError> {
        let path = format!("{}/_doc/{}", name, doc.id);
        let (status, response) = self.send(Method::PUT, &path, Some(&doc.to_value())).await?;
        Self::expect_success(name, status, response)?;
        Ok(())
    }

    async fn delete_document(&self, name: &str, id: &str) -> Result<bool, StorageError> {
        let path = format!("{}/_doc/{}", name, id);
        let (status, response) = self.send(Method::DELETE, &path, None).await?;
        if status == StatusCode::NOT_FOUND && response.get("result").and_then(Value::as_str) == Some("not_found") {
            return Ok(false);
        }
        Self::expect_success(name, status, response)?;
        Ok(true)
    }

    async fn get_document(&self, name: &str, id: &str) -> Result<Option<Value>, StorageError> {
        let path = format!("{}/_doc/{}", name, id);
        let (status, response) = self.send(Method::GET, &path, None).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = Self::expect_success(name, status, response)?;
        Ok(body.get("_source").cloned())
    }

    async fn bulk_index(&self, name: &str, docs: &[Document]) -> Result<BulkResult, StorageError> {
        if docs.is_empty() {
            return Ok(BulkResult::default());
        }
        let response = self
            .http_client
            .post(self.url(&format!("{}/_bulk", name)))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(Self::bulk_body(docs))
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let (status, body) = Self::read(response).await?;
        let body = Self::expect_success(name, status, body)?;
        let result = Self::parse_bulk_response(&body);
        if !result.is_success() {
            warn!(index = %name, failed = result.failed.len(), "Bulk request had item failures");
        }
        Ok(result)
    }

    async fn search(&self, name: &str, request: &SearchRequest) -> Result<SearchHits, StorageError> {
        let body = EsTranslator::translate_request(request);
        let (status, response) = self
            .send(Method::POST, &format!("{}/_search", name), Some(&body))
            .await?;
        let response = Self::expect_success(name, status, response)?;
        Ok(Self::parse_hits(&response))
    }

    async fn refresh(&self, name: &str) -> Result<(), StorageError> {
        let (status, response) = self.send(Method::POST, &format!("{}/_refresh", name), None).await?;
        Self::expect_success(name, status, response)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;
    use uuid::Uuid;

    #[test]
    fn test_url_joins_cleanly() {
        let store = ElasticsearchStore::new("http://localhost:9200/", Duration::from_secs(1)).unwrap();
        assert_eq!(store.url("/_aliases"), "http://localhost:9200/_aliases");
        assert_eq!(store.url("idx/_doc/1"), "http://localhost:9200/idx/_doc/1");
    }

    #[test]
    fn test_failure_mapping() {
        let exists = json!({"error": {"type": "resource_already_exists_exception", "reason": "x"}});
        assert_eq!(
            ElasticsearchStore::failure("idx", StatusCode::BAD_REQUEST, &exists),
            StorageError::IndexExists("idx".into())
        );

        let conflict = json!({"error": {"type": "illegal_argument_exception", "reason": "mapper [name] cannot be changed"}});
        assert!(matches!(
            ElasticsearchStore::failure("idx", StatusCode::BAD_REQUEST, &conflict),
            StorageError::MappingConflict { .. }
        ));

        assert!(matches!(
            ElasticsearchStore::failure("idx", StatusCode::SERVICE_UNAVAILABLE, &Value::Null),
            StorageError::Backend(_)
        ));
    }

    #[test]
    fn test_bulk_body_is_ndjson() {
        let doc = Document::new(EntityKind::Company, Uuid::nil(), serde_json::Map::new());
        let body = ElasticsearchStore::bulk_body(&[doc]);
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(&Uuid::nil().to_string()));
        assert!(body.ends_with('\n'));
    }

    #[test]
    fn test_parse_bulk_response() {
        let body = json!({"items": [
            {"index": {"_id": "a", "status": 201}},
            {"index": {"_id": "b", "error": {"type": "mapper_parsing_exception"}}},
        ]});
        let result = ElasticsearchStore::parse_bulk_response(&body);
        assert_eq!(result.written, 1);
        assert_eq!(result.failed[0].0, "b");
    }

    #[test]
    fn test_parse_hits() {
        let body = json!({"hits": {"total": {"value": 7}, "hits": [
            {"_id": "a", "_score": null, "_source": {"name": "x"}},
        ]}});
        let hits = ElasticsearchStore::parse_hits(&body);
        assert_eq!(hits.total, 7);
        assert_eq!(hits.hits[0].score, 0.0);
        assert_eq!(hits.hits[0].source["name"], json!("x"));
        assert!(hits.hits[0].sort.is_empty());
    }

    #[test]
    fn test_parse_hits_keeps_sort_values() {
        let body = json!({"hits": {"total": {"value": 2}, "hits": [
            {"_id": "a", "_score": 1.5, "_source": {}, "sort": ["acme", "a"]},
        ]}});
        let hits = ElasticsearchStore::parse_hits(&body);
        assert_eq!(hits.hits[0].sort, vec![json!("acme"), json!("a")]);
    }

    #[test]
    fn test_from_config_builds_client() {
        let config = SearchConfig { es_url: "http://es:9200".into(), ..Default::default() };
        let store = ElasticsearchStore::from_config(&config).unwrap();
        assert_eq!(store.url("_refresh"), "http://es:9200/_refresh");
    }
}
