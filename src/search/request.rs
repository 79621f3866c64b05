//! Compiled search request: query plus ordering and window.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::query_builder::Query;

/// Pseudo-field naming the relevance score in sort keys.
pub const SCORE_FIELD: &str = "_score";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: SortOrder::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: SortOrder::Desc }
    }

    pub fn score() -> Self {
        Self::desc(SCORE_FIELD)
    }

    pub fn is_score(&self) -> bool {
        self.field == SCORE_FIELD
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.order.as_str())
    }
}

/// What a document store executes for one page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: Query,
    /// Sort keys in priority order; missing values sort last.
    pub sort: Vec<SortKey>,
    pub offset: usize,
    pub limit: usize,
    /// Sort values of the last hit of the previous page. When set, results
    /// start strictly after it and `offset` is ignored, so paging is not
    /// bounded by the store's result window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_after: Option<Vec<Value>>,
}

impl SearchRequest {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            sort: vec![SortKey::asc("id")],
            offset: 0,
            limit: 10,
            search_after: None,
        }
    }

    pub fn with_sort(mut self, sort: Vec<SortKey>) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_window(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    pub fn with_search_after(mut self, cursor: Vec<Value>) -> Self {
        self.search_after = Some(cursor);
        self.offset = 0;
        self
    }
}
