// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search Infrastructure
//!
//! Query composition and index lifecycle for the document store.
//!
//! # Architecture
//!
//! ```text
//! QuerySpec (client input)
//!     ↓ Composer (per-app QueryRules + DocumentSchema + permission)
//! SearchRequest { Query AST, sort, offset, limit }
//!     ├─→ InMemoryStore evaluates the AST directly
//!     └─→ EsTranslator → Elasticsearch _search body
//! ```
//!
//! # Example
//!
//! ```rust
//! use datahub_search::search::{QuerySpec, SortKey};
//!
//! let spec = QuerySpec::new()
//!     .term("abc")
//!     .filter("archived", false)
//!     .filter("uk_region", vec!["874cd12a-6095-e211-a939-e4115bead28a"])
//!     .sortby("name:desc")
//!     .window(0, 20);
//! assert_eq!(spec.limit, Some(20));
//! assert_eq!(SortKey::desc("name").to_string(), "name:desc");
//! ```

mod composer;
mod es_translator;
mod index_manager;
mod query_builder;
mod request;

pub use composer::{
    autocomplete_query, Composed, Composer, FilterRule, FilterValue, QueryRules, QuerySpec,
    ValidationError, AFTER_SUFFIX, BEFORE_SUFFIX, SORTBY_FIELD,
};
pub use es_translator::EsTranslator;
pub use index_manager::{Backfill, IndexManager, InitOutcome, LifecycleError, MigrationOutcome};
pub use query_builder::{
    FieldOperator, FieldQuery, MultiMatchQuery, Query, QueryBuilder, QueryNode, QueryValue,
};
pub use request::{SearchRequest, SortKey, SortOrder, SCORE_FIELD};
